//! Logger setup plus conditional logging macros that check a module-level
//! `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("This will log if ENABLE_LOGS is true");
//! log_debug!("This only shows up with diagnostics enabled");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

/// Environment switch that turns diagnostics on without the `-v` flag.
pub const DEBUG_ENV: &str = "OCRDESK_DEBUG";

static DIAGNOSTICS: AtomicBool = AtomicBool::new(false);

/// Initialise `env_logger`. `RUST_LOG` still overrides the default filter.
///
/// Diagnostics (skipped macro lines, degraded colour lookups, raw engine
/// output) are emitted at debug level, so they only appear when `verbose`
/// is set or `OCRDESK_DEBUG` is `1`/`true`.
pub fn init_logging(verbose: bool) {
    let diagnostics = verbose || env_flag_enabled();
    DIAGNOSTICS.store(diagnostics, Ordering::SeqCst);

    let level = if diagnostics {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // try_init: tests and the binary may both call this.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

pub fn diagnostics_enabled() -> bool {
    DIAGNOSTICS.load(Ordering::SeqCst)
}

fn env_flag_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Macro for conditional info logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Macro for conditional warn logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Macro for conditional error logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Diagnostics channel. Degradations that are otherwise silent go here.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
