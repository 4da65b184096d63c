pub mod controller;
pub mod error;
pub mod event;
pub mod input;
pub mod keysym;
#[cfg(feature = "native-input")]
pub mod native;
pub mod player;
pub mod recorder;
pub mod send_keys;
pub mod state;
pub mod store;

pub use controller::{ActionOutcome, AutomationController};
pub use error::AutomationError;
pub use event::{parse_log, AutomationEvent, KeyPhase, ParseError, ParsedLog, PointerAction, SkippedLine};
pub use input::{
    InputError, InputInjector, KeyDisposition, KeyHandler, KeyListener, KeyStroke, NoopInjector,
    SENTINEL_KEY,
};
pub use keysym::keysym_for;
#[cfg(feature = "native-input")]
pub use native::{EnigoInjector, RdevKeyListener};
pub use player::{AutomationPlayer, PlaybackHandle, PlaybackReport, WaitOutcome};
pub use recorder::AutomationRecorder;
pub use send_keys::SendKeySession;
pub use state::ControllerState;
pub use store::{EventLog, EventLogStore, FileLogStore, MemoryLogStore};
