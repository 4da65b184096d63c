use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const APP_DIR: &str = "ocrdesk";
const SETTINGS_FILE: &str = "settings.json";
const ACTIVE_LOG_FILE: &str = "active.ocrm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub language: String,
    pub scale_factor: u32,
    pub grayscale: bool,
    pub invert: bool,
    /// Implies `grayscale`.
    pub black_white: bool,
    pub black_white_threshold: u8,
    pub page_segmentation_mode: u8,
    pub engine_binary: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".into(),
            scale_factor: 3,
            grayscale: false,
            invert: false,
            black_white: false,
            black_white_threshold: 200,
            page_segmentation_mode: 4,
            engine_binary: "tesseract".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub enabled: bool,
    pub max_colors: i32,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_colors: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    /// Overrides the per-user location of the active macro.
    pub log_path: Option<PathBuf>,
    /// Pause before an immediate pointer action so the target window can take focus.
    pub pointer_settle_ms: u64,
    /// Delay written in front of every recorded pointer event.
    pub recorded_delay_secs: f64,
    /// Grace period after playback reports completion.
    pub completion_grace_ms: u64,
    /// How often a waiter re-checks that the active macro still exists.
    pub log_poll_interval_ms: u64,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            log_path: None,
            pointer_settle_ms: 800,
            recorded_delay_secs: 0.9,
            completion_grace_ms: 200,
            log_poll_interval_ms: 300,
        }
    }
}

impl AutomationSettings {
    pub fn pointer_settle(&self) -> Duration {
        Duration::from_millis(self.pointer_settle_ms)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms.max(1))
    }

    pub fn resolved_log_path(&self) -> Result<PathBuf> {
        match &self.log_path {
            Some(path) => Ok(path.clone()),
            None => default_log_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub ocr: OcrSettings,
    pub color: ColorSettings,
    pub automation: AutomationSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Open the store. A missing file yields defaults; an unreadable or
    /// malformed one is logged and replaced by defaults on the next save.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("Ignoring malformed settings {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::new(default_settings_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> UserSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn ocr(&self) -> OcrSettings {
        self.snapshot().ocr
    }

    pub fn color(&self) -> ColorSettings {
        self.snapshot().color
    }

    pub fn automation(&self) -> AutomationSettings {
        self.snapshot().automation
    }

    pub fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

pub fn default_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not find the user config directory")?;
    Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
}

pub fn default_log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir().context("Could not find the user data directory")?;
    Ok(data_dir.join(APP_DIR).join(ACTIVE_LOG_FILE))
}
