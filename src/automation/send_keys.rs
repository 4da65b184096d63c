use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::input::{InputError, KeyListener};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Scoped ownership of the global key hook.
///
/// The hook is removed when the sentinel key is pressed, when `finish` is
/// called, or when the session is dropped, whichever comes first.
pub struct SendKeySession {
    listener: Arc<dyn KeyListener>,
    active: Arc<AtomicBool>,
}

impl SendKeySession {
    pub(crate) fn new(listener: Arc<dyn KeyListener>, active: Arc<AtomicBool>) -> Self {
        Self { listener, active }
    }

    /// False once the sentinel has been seen.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn finish(self) -> Result<(), InputError> {
        self.release()
    }

    fn release(&self) -> Result<(), InputError> {
        if self.active.swap(false, Ordering::SeqCst) || self.listener.is_registered() {
            self.listener.deregister()?;
            log_info!("send-key mode closed");
        }
        Ok(())
    }
}

impl Drop for SendKeySession {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log_warn!("failed to remove key hook: {err}");
        }
    }
}
