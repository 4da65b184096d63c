use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

use super::event::{parse_log, AutomationEvent, ParsedLog};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Backing storage for the active event log.
pub trait EventLogStore: Send + Sync {
    fn exists(&self) -> bool;
    /// `None` when no log exists.
    fn read(&self) -> Result<Option<String>>;
    /// Append `chunk` in one write, creating the log if needed.
    fn append(&self, chunk: &str) -> Result<()>;
    fn replace(&self, contents: &str) -> Result<()>;
    /// Removing a missing log is not an error.
    fn remove(&self) -> Result<()>;
    /// Filesystem location, when there is one.
    fn location(&self) -> Option<&Path> {
        None
    }
}

pub struct FileLogStore {
    path: PathBuf,
}

impl FileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory {}", parent.display())
            })?;
        }
        Ok(())
    }
}

impl EventLogStore for FileLogStore {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("failed to read event log {}", self.path.display()))),
        }
    }

    fn append(&self, chunk: &str) -> Result<()> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open event log {}", self.path.display()))?;
        file.write_all(chunk.as_bytes())
            .with_context(|| format!("failed to append to event log {}", self.path.display()))
    }

    fn replace(&self, contents: &str) -> Result<()> {
        self.ensure_parent()?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move log into {}", self.path.display()))
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("failed to remove event log {}", self.path.display()))),
        }
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[derive(Default)]
pub struct MemoryLogStore {
    contents: Mutex<Option<String>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_contents<T>(&self, f: impl FnOnce(&mut Option<String>) -> T) -> Result<T> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| anyhow!("memory log store poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl EventLogStore for MemoryLogStore {
    fn exists(&self) -> bool {
        self.with_contents(|contents| contents.is_some())
            .unwrap_or(false)
    }

    fn read(&self) -> Result<Option<String>> {
        self.with_contents(|contents| contents.clone())
    }

    fn append(&self, chunk: &str) -> Result<()> {
        self.with_contents(|contents| contents.get_or_insert_with(String::new).push_str(chunk))
    }

    fn replace(&self, contents: &str) -> Result<()> {
        self.with_contents(|slot| *slot = Some(contents.to_string()))
    }

    fn remove(&self) -> Result<()> {
        self.with_contents(|contents| *contents = None)
    }
}

/// The active event log: what gets recorded into and played back from.
#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn EventLogStore>,
}

impl EventLog {
    pub fn new(store: Arc<dyn EventLogStore>) -> Self {
        Self { store }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileLogStore::new(path)))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryLogStore::new()))
    }

    pub fn location(&self) -> Option<&Path> {
        self.store.location()
    }

    pub fn is_loaded(&self) -> bool {
        self.store.exists()
    }

    /// Append events as one write so a concurrent reader never sees half a group.
    pub fn append(&self, events: &[AutomationEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let chunk: String = events
            .iter()
            .map(|event| format!("{}\n", event.to_line()))
            .collect();
        self.store.append(&chunk)
    }

    pub fn raw(&self) -> Result<Option<String>> {
        self.store.read()
    }

    pub fn parse(&self) -> Result<Option<ParsedLog>> {
        Ok(self.store.read()?.map(|contents| parse_log(&contents)))
    }

    /// Make the file at `source` the active log.
    pub fn load_from(&self, source: &Path) -> Result<()> {
        if !source.is_file() {
            return Err(anyhow!("macro file {} does not exist", source.display()));
        }
        if let Some(active) = self.location() {
            if same_file(active, source) {
                log_info!("{} is already the active log", source.display());
                return Ok(());
            }
        }

        let contents = fs::read_to_string(source)
            .with_context(|| format!("failed to read macro file {}", source.display()))?;
        self.store.replace(&contents)?;
        log_info!("loaded macro from {}", source.display());
        Ok(())
    }

    /// Copy the active log to `destination`. Returns false when there is
    /// nothing to save.
    pub fn save_to(&self, destination: &Path) -> Result<bool> {
        let Some(contents) = self.store.read()? else {
            log_warn!("no active log to save");
            return Ok(false);
        };
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(destination, contents)
            .with_context(|| format!("failed to save macro to {}", destination.display()))?;
        log_info!("saved macro to {}", destination.display());
        Ok(true)
    }

    pub fn unload(&self) -> Result<()> {
        self.store.remove()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
