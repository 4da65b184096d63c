use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ControllerState {
    Idle,
    /// The next pointer/key action is recorded instead of executed.
    Armed,
    Running,
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState::Idle
    }
}

impl ControllerState {
    pub fn is_armed(&self) -> bool {
        *self == ControllerState::Armed
    }

    pub fn is_running(&self) -> bool {
        *self == ControllerState::Running
    }
}
