use anyhow::Result;

use super::event::{AutomationEvent, PointerAction};
use super::input::KeyStroke;
use super::store::EventLog;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Appends user actions to the active log while armed.
#[derive(Clone)]
pub struct AutomationRecorder {
    log: EventLog,
    pointer_delay_secs: f64,
}

impl AutomationRecorder {
    pub fn new(log: EventLog, pointer_delay_secs: f64) -> Self {
        Self {
            log,
            pointer_delay_secs: pointer_delay_secs.max(0.0),
        }
    }

    /// Writes the settle delay and the pointer event together.
    pub fn record_pointer(&self, x: i32, y: i32, action: PointerAction) -> Result<()> {
        log_debug!("recording pointer {} at ({x}, {y})", action.token());
        self.log.append(&[
            AutomationEvent::Delay {
                seconds: self.pointer_delay_secs,
            },
            AutomationEvent::Pointer { x, y, action },
        ])
    }

    pub fn record_key(&self, stroke: &KeyStroke) -> Result<()> {
        log_debug!("recording key {:?} phase {}", stroke.symbol, stroke.phase.as_id());
        self.log.append(&[AutomationEvent::Key {
            code: stroke.code,
            symbol: stroke.symbol.clone(),
            phase: stroke.phase,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::event::KeyPhase;

    #[test]
    fn pointer_records_are_preceded_by_a_delay() {
        let log = EventLog::memory();
        let recorder = AutomationRecorder::new(log.clone(), 0.9);
        recorder.record_pointer(100, 200, PointerAction::LeftClick).unwrap();
        assert_eq!(log.raw().unwrap().unwrap(), "c,delay,0.9\nm,100,200,b1c\n");
    }

    #[test]
    fn keys_are_recorded_verbatim() {
        let log = EventLog::memory();
        let recorder = AutomationRecorder::new(log.clone(), 0.9);
        recorder
            .record_key(&KeyStroke::new(0, ",", KeyPhase::Press))
            .unwrap();
        recorder
            .record_key(&KeyStroke::new(0xff0d, "Return", KeyPhase::Release))
            .unwrap();
        assert_eq!(log.raw().unwrap().unwrap(), "k,0,,,0\nk,65293,Return,1\n");
    }
}
