use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use image::DynamicImage;
use serde_json::json;

use crate::automation::{
    ActionOutcome, AutomationController, EventLog, InputInjector, KeyPhase, KeyStroke,
    NoopInjector, PointerAction, WaitOutcome,
};
use crate::ocr::{OcrPipeline, TesseractEngine};
use crate::settings::{SettingsStore, UserSettings};
use crate::utils::diagnostics_enabled;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Parser, Debug)]
#[command(
    name = "ocrdesk",
    version,
    about = "Read on-screen text with OCR and replay recorded clicks and keystrokes"
)]
pub struct Cli {
    /// Log diagnostics (same as OCRDESK_DEBUG=1)
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    /// Settings file (default: <config dir>/ocrdesk/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recognise text in captured images
    Ocr(OcrArgs),
    /// Manage and play the active macro
    #[command(subcommand)]
    Macro(MacroCommand),
    /// Click at screen coordinates, or record the click
    Click(ClickArgs),
    /// Send a key, or record it
    Key(KeyArgs),
    /// Capture every key system-wide until F4 is pressed
    #[command(name = "send-keys")]
    SendKeys(SendKeysArgs),
}

#[derive(Args, Debug)]
pub struct OcrArgs {
    /// Images to read, in capture order
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Screen x of the images' top-left corner
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    offset_x: f64,
    /// Screen y of the images' top-left corner
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    offset_y: f64,
    /// Tesseract language
    #[arg(long)]
    lang: Option<String>,
    /// Upscale factor applied before recognition
    #[arg(long)]
    scale: Option<u32>,
    #[arg(long, action = ArgAction::SetTrue)]
    grayscale: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    invert: bool,
    /// Threshold to pure black and white
    #[arg(long, action = ArgAction::SetTrue)]
    black_white: bool,
    #[arg(long)]
    threshold: Option<u8>,
    /// Tesseract page segmentation mode
    #[arg(long)]
    psm: Option<u8>,
    /// Label each word with its dominant colours
    #[arg(long, action = ArgAction::SetTrue)]
    colors: bool,
    #[arg(long)]
    max_colors: Option<i32>,
    /// Print text and words as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    /// Text only, skip the word list
    #[arg(long, action = ArgAction::SetTrue)]
    headless: bool,
    /// Persist the OCR options given here as the new defaults
    #[arg(long, action = ArgAction::SetTrue)]
    save_settings: bool,
    /// Load and play this macro before reading the images
    #[arg(long = "macro")]
    macro_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum MacroCommand {
    /// Play the active macro
    Run,
    /// Replace the active macro with a file
    Load { path: PathBuf },
    /// Copy the active macro to a file
    Save { path: PathBuf },
    /// Delete the active macro
    Unload,
    /// List the events in the active macro
    Show {
        /// Print the stored lines only
        #[arg(long, action = ArgAction::SetTrue)]
        raw: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ClickKind {
    Move,
    /// Move without pressing; recorded as a plain route point
    Route,
    #[default]
    Left,
    Double,
    Right,
    Middle,
}

impl From<ClickKind> for PointerAction {
    fn from(kind: ClickKind) -> Self {
        match kind {
            ClickKind::Move => PointerAction::Move,
            ClickKind::Route => PointerAction::None,
            ClickKind::Left => PointerAction::LeftClick,
            ClickKind::Double => PointerAction::DoubleClick,
            ClickKind::Right => PointerAction::RightClick,
            ClickKind::Middle => PointerAction::MiddleClick,
        }
    }
}

#[derive(Args, Debug)]
pub struct ClickArgs {
    #[arg(allow_negative_numbers = true)]
    x: i32,
    #[arg(allow_negative_numbers = true)]
    y: i32,
    #[arg(long, value_enum, default_value = "left")]
    action: ClickKind,
    /// Append to the active macro instead of clicking
    #[arg(long, action = ArgAction::SetTrue)]
    record: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum KeyKind {
    Press,
    Release,
    #[default]
    Type,
}

impl From<KeyKind> for KeyPhase {
    fn from(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Press => KeyPhase::Press,
            KeyKind::Release => KeyPhase::Release,
            KeyKind::Type => KeyPhase::PressRelease,
        }
    }
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key symbol, e.g. Return, Tab, a
    symbol: String,
    /// Raw keycode; 0 resolves the symbol at playback
    #[arg(long, default_value_t = 0)]
    code: u32,
    #[arg(long, value_enum, default_value = "type")]
    phase: KeyKind,
    /// Append to the active macro instead of sending
    #[arg(long, action = ArgAction::SetTrue)]
    record: bool,
}

#[derive(Args, Debug)]
pub struct SendKeysArgs {
    /// Record the captured keys instead of letting them through
    #[arg(long, action = ArgAction::SetTrue)]
    record: bool,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let store = match &cli.settings {
        Some(path) => SettingsStore::new(path.clone())?,
        None => SettingsStore::open_default()?,
    };

    match cli.command {
        Commands::Ocr(args) => command_ocr(&store, args).await,
        Commands::Macro(command) => command_macro(&store, command).await,
        Commands::Click(args) => command_click(&store, args).await,
        Commands::Key(args) => command_key(&store, args).await,
        Commands::SendKeys(args) => command_send_keys(&store, args).await,
    }
}

fn live_injector() -> Result<Arc<dyn InputInjector>> {
    #[cfg(feature = "native-input")]
    {
        let injector = crate::automation::EnigoInjector::new()
            .context("failed to start the input backend")?;
        Ok(Arc::new(injector))
    }
    #[cfg(not(feature = "native-input"))]
    {
        log_warn!("built without native-input; actions are logged, not performed");
        Ok(Arc::new(NoopInjector))
    }
}

fn controller(store: &SettingsStore, live: bool) -> Result<AutomationController> {
    let settings = store.automation();
    let log = EventLog::file(settings.resolved_log_path()?);
    let injector: Arc<dyn InputInjector> = if live {
        live_injector()?
    } else {
        Arc::new(NoopInjector)
    };
    Ok(AutomationController::new(log, injector, &settings))
}

fn apply_ocr_overrides(settings: &mut UserSettings, args: &OcrArgs) {
    let ocr = &mut settings.ocr;
    if let Some(lang) = &args.lang {
        ocr.language = lang.clone();
    }
    if let Some(scale) = args.scale {
        ocr.scale_factor = scale;
    }
    if let Some(threshold) = args.threshold {
        ocr.black_white_threshold = threshold;
    }
    if let Some(psm) = args.psm {
        ocr.page_segmentation_mode = psm;
    }
    ocr.grayscale |= args.grayscale;
    ocr.invert |= args.invert;
    ocr.black_white |= args.black_white;

    settings.color.enabled |= args.colors;
    if let Some(max_colors) = args.max_colors {
        settings.color.max_colors = max_colors;
    }
}

async fn command_ocr(store: &SettingsStore, args: OcrArgs) -> Result<()> {
    let mut settings = store.snapshot();
    apply_ocr_overrides(&mut settings, &args);
    if args.save_settings {
        store.update(|stored| apply_ocr_overrides(stored, &args))?;
        log_info!("saved OCR options to {}", store.path().display());
    }

    if let Some(path) = &args.macro_file {
        let controller = controller(store, true)?;
        controller.load_log(path)?;
        play(&controller).await?;
    }

    let images = args
        .images
        .iter()
        .map(|path| {
            image::open(path).with_context(|| format!("failed to open image {}", path.display()))
        })
        .collect::<Result<Vec<DynamicImage>>>()?;

    let engine = TesseractEngine::from_settings(&settings.ocr);
    let mut pipeline = OcrPipeline::from_settings(engine, &settings);
    pipeline.set_build_word_list(!args.headless);

    // The engine blocks on a child process.
    let offset = (args.offset_x, args.offset_y);
    let output = tokio::task::spawn_blocking(move || pipeline.process(&images, offset))
        .await
        .context("OCR task panicked")??;

    if args.json {
        let document = json!({ "text": output.text, "words": output.words });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        println!("{}", output.text);
    }
    Ok(())
}

async fn play(controller: &AutomationController) -> Result<()> {
    let handle = controller.run()?;
    match handle.wait().await {
        WaitOutcome::Finished(report) => {
            println!(
                "played {} events ({} skipped, {} failed{})",
                report.executed,
                report.skipped,
                report.failed,
                if report.cancelled { ", cancelled" } else { "" }
            );
        }
        WaitOutcome::LogRemoved => println!("macro was unloaded during playback"),
    }
    Ok(())
}

async fn command_macro(store: &SettingsStore, command: MacroCommand) -> Result<()> {
    match command {
        MacroCommand::Run => {
            let controller = controller(store, true)?;
            let playback = play(&controller);
            tokio::select! {
                result = playback => result,
                _ = tokio::signal::ctrl_c() => {
                    controller.cancel_playback();
                    bail!("playback interrupted");
                }
            }
        }
        MacroCommand::Load { path } => {
            controller(store, false)?.load_log(&path)?;
            println!("loaded {}", path.display());
            Ok(())
        }
        MacroCommand::Save { path } => {
            if controller(store, false)?.save_log(&path)? {
                println!("saved {}", path.display());
            } else {
                println!("no macro loaded");
            }
            Ok(())
        }
        MacroCommand::Unload => {
            controller(store, false)?.unload_log()?;
            println!("macro unloaded");
            Ok(())
        }
        MacroCommand::Show { raw } => {
            let controller = controller(store, false)?;
            let Some(parsed) = controller.log().parse()? else {
                println!("no macro loaded");
                return Ok(());
            };
            for (index, event) in parsed.events.iter().enumerate() {
                if raw {
                    println!("{event}");
                } else {
                    println!("{:>4}  {}", index + 1, event.describe());
                }
            }
            if diagnostics_enabled() {
                for skipped in &parsed.skipped {
                    log_warn!("line {} {:?} ignored: {}", skipped.number, skipped.line, skipped.error);
                }
            } else if !parsed.skipped.is_empty() {
                log_warn!("{} unreadable lines ignored, rerun with -v for details", parsed.skipped.len());
            }
            Ok(())
        }
    }
}

async fn finish(outcome: ActionOutcome) -> Result<()> {
    match outcome {
        ActionOutcome::Recorded => println!("recorded"),
        ActionOutcome::Dispatched(handle) => handle.await.context("input task panicked")?,
    }
    Ok(())
}

async fn command_click(store: &SettingsStore, args: ClickArgs) -> Result<()> {
    let controller = controller(store, !args.record)?;
    controller.set_armed(args.record)?;
    let outcome = controller.pointer_action(args.x, args.y, args.action.into())?;
    finish(outcome).await
}

async fn command_key(store: &SettingsStore, args: KeyArgs) -> Result<()> {
    let controller = controller(store, !args.record)?;
    controller.set_armed(args.record)?;
    let outcome = controller.key_action(KeyStroke::new(args.code, args.symbol, args.phase.into()))?;
    finish(outcome).await
}

#[cfg(feature = "native-input")]
async fn command_send_keys(store: &SettingsStore, args: SendKeysArgs) -> Result<()> {
    use std::time::Duration;

    let controller = controller(store, false)?;
    controller.set_armed(args.record)?;
    let listener = Arc::new(crate::automation::RdevKeyListener::new());
    let session = controller.enter_send_keys(listener)?;
    println!("capturing keys, press F4 to stop");

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !session.is_active() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    session.finish()?;
    Ok(())
}

#[cfg(not(feature = "native-input"))]
async fn command_send_keys(_store: &SettingsStore, _args: SendKeysArgs) -> Result<()> {
    bail!("send-keys needs a build with the native-input feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ocr_overrides() {
        let cli = Cli::parse_from([
            "ocrdesk", "ocr", "a.png", "b.png", "--scale", "2", "--black-white", "--colors",
            "--offset-x", "-10",
        ]);
        let Commands::Ocr(args) = cli.command else {
            panic!("expected ocr");
        };
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.offset_x, -10.0);

        let mut settings = UserSettings::default();
        apply_ocr_overrides(&mut settings, &args);
        assert_eq!(settings.ocr.scale_factor, 2);
        assert!(settings.ocr.black_white);
        assert!(settings.color.enabled);
        assert_eq!(settings.ocr.language, "eng");
    }

    #[test]
    fn parses_click_and_key() {
        let cli = Cli::parse_from(["ocrdesk", "click", "100", "200", "--record"]);
        let Commands::Click(args) = cli.command else {
            panic!("expected click");
        };
        assert_eq!(PointerAction::from(args.action), PointerAction::LeftClick);
        assert!(args.record);

        let cli = Cli::parse_from(["ocrdesk", "-v", "key", "Return", "--phase", "press"]);
        assert!(cli.verbose);
        let Commands::Key(args) = cli.command else {
            panic!("expected key");
        };
        assert_eq!(KeyPhase::from(args.phase), KeyPhase::Press);
    }

    #[tokio::test]
    async fn recorded_click_lands_in_the_configured_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let log_path = dir.path().join("active.ocrm");
        let configured = log_path.clone();
        store
            .update(move |settings| settings.automation.log_path = Some(configured))
            .unwrap();

        let cli = Cli::parse_from(["ocrdesk", "click", "100", "200", "--record"]);
        let Commands::Click(args) = cli.command else {
            panic!("expected click");
        };
        command_click(&store, args).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(log_path).unwrap(),
            "c,delay,0.9\nm,100,200,b1c\n"
        );
    }

    #[tokio::test]
    async fn recorded_route_writes_a_plain_move() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let log_path = dir.path().join("active.ocrm");
        let configured = log_path.clone();
        store
            .update(move |settings| settings.automation.log_path = Some(configured))
            .unwrap();

        let cli = Cli::parse_from(["ocrdesk", "click", "40", "-8", "--action", "route", "--record"]);
        let Commands::Click(args) = cli.command else {
            panic!("expected click");
        };
        assert_eq!(PointerAction::from(args.action), PointerAction::None);
        command_click(&store, args).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(log_path).unwrap(),
            "c,delay,0.9\nm,40,-8,None\n"
        );
    }
}
