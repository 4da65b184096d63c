use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyPhase {
    Press,
    Release,
    PressRelease,
}

impl KeyPhase {
    pub fn as_id(&self) -> u8 {
        match self {
            KeyPhase::Press => 0,
            KeyPhase::Release => 1,
            KeyPhase::PressRelease => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(KeyPhase::Press),
            1 => Some(KeyPhase::Release),
            2 => Some(KeyPhase::PressRelease),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerAction {
    Move,
    LeftClick,
    DoubleClick,
    RightClick,
    MiddleClick,
    /// Position only; no button is pressed.
    None,
}

impl PointerAction {
    pub fn token(&self) -> &'static str {
        match self {
            PointerAction::Move => "abs",
            PointerAction::LeftClick => "b1c",
            PointerAction::DoubleClick => "b1d",
            PointerAction::RightClick => "b3c",
            PointerAction::MiddleClick => "b2c",
            PointerAction::None => "None",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "abs" => Some(PointerAction::Move),
            "b1c" => Some(PointerAction::LeftClick),
            "b1d" => Some(PointerAction::DoubleClick),
            "b3c" => Some(PointerAction::RightClick),
            "b2c" => Some(PointerAction::MiddleClick),
            "None" => Some(PointerAction::None),
            _ => None,
        }
    }

    pub fn presses_button(&self) -> bool {
        !matches!(self, PointerAction::Move | PointerAction::None)
    }

    fn label(&self) -> &'static str {
        match self {
            PointerAction::Move | PointerAction::None => "move to",
            PointerAction::LeftClick => "left click at",
            PointerAction::DoubleClick => "double click at",
            PointerAction::RightClick => "right click at",
            PointerAction::MiddleClick => "middle click at",
        }
    }
}

/// One step of a recorded macro, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AutomationEvent {
    Delay {
        seconds: f64,
    },
    Key {
        /// 0 means "resolve `symbol` through the keysym table at playback".
        code: u32,
        symbol: String,
        phase: KeyPhase,
    },
    Pointer {
        x: i32,
        y: i32,
        action: PointerAction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown record kind '{0}'")]
    UnknownKind(String),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("malformed {kind} record: {reason}")]
    Malformed { kind: char, reason: String },
}

fn malformed(kind: char, reason: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        kind,
        reason: reason.into(),
    }
}

impl AutomationEvent {
    /// Serialise to the one-line log format, without the newline.
    pub fn to_line(&self) -> String {
        match self {
            AutomationEvent::Delay { seconds } => format!("c,delay,{seconds}"),
            AutomationEvent::Key {
                code,
                symbol,
                phase,
            } => format!("k,{code},{symbol},{}", phase.as_id()),
            AutomationEvent::Pointer { x, y, action } => {
                format!("m,{x},{y},{}", action.token())
            }
        }
    }

    /// Human-readable form for listings.
    pub fn describe(&self) -> String {
        match self {
            AutomationEvent::Delay { seconds } => format!("wait {seconds}s"),
            AutomationEvent::Key {
                code,
                symbol,
                phase,
            } => {
                let verb = match phase {
                    KeyPhase::Press => "press",
                    KeyPhase::Release => "release",
                    KeyPhase::PressRelease => "type",
                };
                if *code == 0 {
                    format!("{verb} {symbol:?}")
                } else {
                    format!("{verb} {symbol:?} (code {code})")
                }
            }
            AutomationEvent::Pointer { x, y, action } => format!("{} ({x}, {y})", action.label()),
        }
    }

    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let (kind, rest) = line.split_once(',').unwrap_or((line, ""));

        match kind.trim() {
            "c" => parse_command(rest),
            "k" => parse_key(rest),
            "m" => parse_pointer(rest),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

fn parse_command(rest: &str) -> Result<AutomationEvent, ParseError> {
    let (command, value) = rest.split_once(',').unwrap_or((rest, ""));
    if command.trim() != "delay" {
        return Err(ParseError::UnknownCommand(command.trim().to_string()));
    }
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| malformed('c', format!("invalid delay '{}'", value.trim())))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(malformed('c', format!("delay out of range: {seconds}")));
    }
    Ok(AutomationEvent::Delay { seconds })
}

/// `<code>,<symbol>,<phase>`; the symbol may itself contain commas.
fn parse_key(rest: &str) -> Result<AutomationEvent, ParseError> {
    let (code, tail) = rest
        .split_once(',')
        .ok_or_else(|| malformed('k', "missing symbol and phase"))?;
    let (symbol, phase) = tail
        .rsplit_once(',')
        .ok_or_else(|| malformed('k', "missing phase"))?;

    let code: u32 = code
        .trim()
        .parse()
        .map_err(|_| malformed('k', format!("invalid keycode '{}'", code.trim())))?;
    let phase = phase
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(KeyPhase::from_id)
        .ok_or_else(|| malformed('k', format!("invalid phase '{}'", phase.trim())))?;

    Ok(AutomationEvent::Key {
        code,
        symbol: symbol.to_string(),
        phase,
    })
}

fn parse_pointer(rest: &str) -> Result<AutomationEvent, ParseError> {
    let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
    let [x, y, action] = fields.as_slice() else {
        return Err(malformed('m', format!("expected 3 fields, got {}", fields.len())));
    };
    let x: i32 = x
        .parse()
        .map_err(|_| malformed('m', format!("invalid x '{x}'")))?;
    let y: i32 = y
        .parse()
        .map_err(|_| malformed('m', format!("invalid y '{y}'")))?;
    let action = PointerAction::from_token(action)
        .ok_or_else(|| malformed('m', format!("unknown action '{action}'")))?;
    Ok(AutomationEvent::Pointer { x, y, action })
}

impl fmt::Display for AutomationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl FromStr for AutomationEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based.
    pub number: usize,
    pub line: String,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    pub events: Vec<AutomationEvent>,
    pub skipped: Vec<SkippedLine>,
}

/// Parse a whole log. Blank lines are ignored; unrecognised ones are
/// collected in `skipped` rather than failing the parse.
pub fn parse_log(contents: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    for (index, line) in contents.lines().enumerate() {
        match AutomationEvent::parse_line(line) {
            Ok(event) => parsed.events.push(event),
            Err(ParseError::Empty) => {}
            Err(error) => parsed.skipped.push(SkippedLine {
                number: index + 1,
                line: line.to_string(),
                error,
            }),
        }
    }
    parsed
}
