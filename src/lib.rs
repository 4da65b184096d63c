pub mod automation;
mod cli;
pub mod color;
pub mod ocr;
pub mod reconstruct;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use clap::Parser;

const ENABLE_LOGS: bool = true;

pub use automation::{AutomationController, ControllerState, EventLog};
pub use ocr::{OcrEngine, OcrOutput, OcrPipeline, TesseractEngine};
pub use reconstruct::{Reconstruction, TextReconstructor, WordEntry};
pub use settings::{SettingsStore, UserSettings};

/// Entry point for the `ocrdesk` binary.
pub fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    utils::init_logging(cli.verbose);
    log_info!("ocrdesk {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(cli::execute(cli))
}
