use thiserror::Error;

use super::input::InputError;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("no macro is loaded")]
    NoLogAvailable,
    #[error("a macro is playing")]
    Busy,
    #[error("send-key mode is already active")]
    SendKeysActive,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
