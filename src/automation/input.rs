use thiserror::Error;

use super::event::{KeyPhase, PointerAction};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Key that ends send-key mode.
pub const SENTINEL_KEY: &str = "F4";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input backend unavailable: {0}")]
    Unavailable(String),
    #[error("input injection failed: {0}")]
    Injection(String),
    #[error("unsupported key '{0}'")]
    UnsupportedKey(String),
    #[error("a key handler is already registered")]
    HandlerRegistered,
}

/// Synthesises pointer and keyboard input on the desktop.
pub trait InputInjector: Send + Sync {
    /// Move to (`x`, `y`) in screen coordinates, then perform `action` there.
    fn pointer(&self, x: i32, y: i32, action: PointerAction) -> Result<(), InputError>;

    /// `code` 0 means only `symbol` is known.
    fn key(&self, code: u32, symbol: &str, phase: KeyPhase) -> Result<(), InputError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    pub code: u32,
    pub symbol: String,
    pub phase: KeyPhase,
}

impl KeyStroke {
    pub fn new(code: u32, symbol: impl Into<String>, phase: KeyPhase) -> Self {
        Self {
            code,
            symbol: symbol.into(),
            phase,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.phase != KeyPhase::Release && self.symbol == SENTINEL_KEY
    }
}

/// What a key handler wants done with the stroke it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Let the stroke reach the focused application.
    Forward,
    /// Consume it.
    Swallow,
    /// Consume it and deregister the handler.
    Release,
}

pub type KeyHandler = Box<dyn FnMut(&KeyStroke) -> KeyDisposition + Send>;

/// Global keyboard hook. At most one handler is registered at a time.
pub trait KeyListener: Send + Sync {
    fn register(&self, handler: KeyHandler) -> Result<(), InputError>;
    fn deregister(&self) -> Result<(), InputError>;
    fn is_registered(&self) -> bool;
}

/// Logs instead of injecting. Used when no native backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInjector;

impl InputInjector for NoopInjector {
    fn pointer(&self, x: i32, y: i32, action: PointerAction) -> Result<(), InputError> {
        log_info!("pointer {} at ({x}, {y}) not injected: no input backend", action.token());
        Ok(())
    }

    fn key(&self, code: u32, symbol: &str, phase: KeyPhase) -> Result<(), InputError> {
        log_info!(
            "key {symbol:?} (code {code}, phase {}) not injected: no input backend",
            phase.as_id()
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Injected {
        Pointer(i32, i32, PointerAction),
        Key(u32, String, KeyPhase),
    }

    /// Records every call; optionally fails pointer injection.
    #[derive(Default, Clone)]
    pub struct RecordingInjector {
        pub calls: Arc<Mutex<Vec<Injected>>>,
        pub fail_pointer: bool,
    }

    impl RecordingInjector {
        pub fn calls(&self) -> Vec<Injected> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl InputInjector for RecordingInjector {
        fn pointer(&self, x: i32, y: i32, action: PointerAction) -> Result<(), InputError> {
            self.calls.lock().unwrap().push(Injected::Pointer(x, y, action));
            if self.fail_pointer {
                return Err(InputError::Injection("pointer device gone".into()));
            }
            Ok(())
        }

        fn key(&self, code: u32, symbol: &str, phase: KeyPhase) -> Result<(), InputError> {
            self.calls
                .lock()
                .unwrap()
                .push(Injected::Key(code, symbol.to_string(), phase));
            Ok(())
        }
    }

    /// Listener driven by the test through `press`.
    #[derive(Default, Clone)]
    pub struct FakeKeyListener {
        handler: Arc<Mutex<Option<KeyHandler>>>,
    }

    impl FakeKeyListener {
        /// Deliver a stroke; returns `None` when no handler is registered.
        pub fn press(&self, stroke: KeyStroke) -> Option<KeyDisposition> {
            let mut slot = self.handler.lock().unwrap();
            let handler = slot.as_mut()?;
            let disposition = handler(&stroke);
            if disposition == KeyDisposition::Release {
                *slot = None;
            }
            Some(disposition)
        }
    }

    impl KeyListener for FakeKeyListener {
        fn register(&self, handler: KeyHandler) -> Result<(), InputError> {
            let mut slot = self.handler.lock().unwrap();
            if slot.is_some() {
                return Err(InputError::HandlerRegistered);
            }
            *slot = Some(handler);
            Ok(())
        }

        fn deregister(&self) -> Result<(), InputError> {
            *self.handler.lock().unwrap() = None;
            Ok(())
        }

        fn is_registered(&self) -> bool {
            self.handler.lock().unwrap().is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_pressed_f4_is_the_sentinel() {
        assert!(KeyStroke::new(0, "F4", KeyPhase::Press).is_sentinel());
        assert!(KeyStroke::new(0, "F4", KeyPhase::PressRelease).is_sentinel());
        assert!(!KeyStroke::new(0, "F4", KeyPhase::Release).is_sentinel());
        assert!(!KeyStroke::new(0, "F5", KeyPhase::Press).is_sentinel());
    }

    #[test]
    fn noop_injector_accepts_everything() {
        let injector = NoopInjector;
        assert!(injector.pointer(1, 2, PointerAction::LeftClick).is_ok());
        assert!(injector.key(0, "a", KeyPhase::PressRelease).is_ok());
    }
}
