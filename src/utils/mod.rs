pub mod logging;

pub use logging::{diagnostics_enabled, init_logging};
