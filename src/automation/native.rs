//! Desktop input backends: `enigo` for injection, `rdev` for the global key hook.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use rdev::{grab, Event, EventType};

use super::event::{KeyPhase, PointerAction};
use super::input::{InputError, InputInjector, KeyDisposition, KeyHandler, KeyListener, KeyStroke};
use super::keysym::{keysym_for, symbol_for};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

enum InputCommand {
    Pointer {
        x: i32,
        y: i32,
        action: PointerAction,
        reply: mpsc::Sender<Result<(), InputError>>,
    },
    Key {
        code: u32,
        symbol: String,
        phase: KeyPhase,
        reply: mpsc::Sender<Result<(), InputError>>,
    },
}

/// Owns an `Enigo` on a dedicated thread and forwards calls to it.
pub struct EnigoInjector {
    sender: Mutex<mpsc::Sender<InputCommand>>,
}

impl EnigoInjector {
    pub fn new() -> Result<Self, InputError> {
        let (command_tx, command_rx) = mpsc::channel::<InputCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), InputError>>();

        thread::Builder::new()
            .name("ocrdesk-input".into())
            .spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => enigo,
                    Err(err) => {
                        let _ = ready_tx.send(Err(InputError::Unavailable(err.to_string())));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        InputCommand::Pointer {
                            x,
                            y,
                            action,
                            reply,
                        } => {
                            let _ = reply.send(perform_pointer(&mut enigo, x, y, action));
                        }
                        InputCommand::Key {
                            code,
                            symbol,
                            phase,
                            reply,
                        } => {
                            let _ = reply.send(perform_key(&mut enigo, code, &symbol, phase));
                        }
                    }
                }
                log_info!("input thread shutting down");
            })
            .map_err(|err| InputError::Unavailable(format!("failed to spawn input thread: {err}")))?;

        ready_rx
            .recv()
            .map_err(|_| InputError::Unavailable("input thread exited during startup".into()))??;

        Ok(Self {
            sender: Mutex::new(command_tx),
        })
    }

    fn dispatch(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<(), InputError>>) -> InputCommand,
    ) -> Result<(), InputError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.sender
            .lock()
            .map_err(|_| InputError::Unavailable("input sender poisoned".into()))?
            .send(build(reply_tx))
            .map_err(|_| InputError::Unavailable("input thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| InputError::Unavailable("input thread dropped the request".into()))?
    }
}

impl InputInjector for EnigoInjector {
    fn pointer(&self, x: i32, y: i32, action: PointerAction) -> Result<(), InputError> {
        self.dispatch(|reply| InputCommand::Pointer {
            x,
            y,
            action,
            reply,
        })
    }

    fn key(&self, code: u32, symbol: &str, phase: KeyPhase) -> Result<(), InputError> {
        let symbol = symbol.to_string();
        self.dispatch(|reply| InputCommand::Key {
            code,
            symbol,
            phase,
            reply,
        })
    }
}

fn perform_pointer(enigo: &mut Enigo, x: i32, y: i32, action: PointerAction) -> Result<(), InputError> {
    let failed = |err: enigo::InputError| InputError::Injection(err.to_string());
    enigo.move_mouse(x, y, Coordinate::Abs).map_err(failed)?;

    match action {
        PointerAction::Move | PointerAction::None => Ok(()),
        PointerAction::LeftClick => enigo.button(Button::Left, Direction::Click).map_err(failed),
        PointerAction::DoubleClick => {
            enigo.button(Button::Left, Direction::Click).map_err(failed)?;
            enigo.button(Button::Left, Direction::Click).map_err(failed)
        }
        PointerAction::RightClick => enigo.button(Button::Right, Direction::Click).map_err(failed),
        PointerAction::MiddleClick => enigo.button(Button::Middle, Direction::Click).map_err(failed),
    }
}

fn perform_key(enigo: &mut Enigo, code: u32, symbol: &str, phase: KeyPhase) -> Result<(), InputError> {
    let key = enigo_key(code, symbol).ok_or_else(|| InputError::UnsupportedKey(symbol.to_string()))?;
    let direction = match phase {
        KeyPhase::Press => Direction::Press,
        KeyPhase::Release => Direction::Release,
        KeyPhase::PressRelease => Direction::Click,
    };
    enigo
        .key(key, direction)
        .map_err(|err| InputError::Injection(err.to_string()))
}

fn enigo_key(code: u32, symbol: &str) -> Option<Key> {
    let name = if symbol.is_empty() {
        symbol_for(code)?
    } else {
        symbol
    };
    let key = match name {
        "Return" | "KP_Enter" => Key::Return,
        "Tab" | "ISO_Left_Tab" => Key::Tab,
        "Escape" => Key::Escape,
        "BackSpace" => Key::Backspace,
        "Delete" => Key::Delete,
        "Home" => Key::Home,
        "End" => Key::End,
        "Page_Up" | "Prior" => Key::PageUp,
        "Page_Down" | "Next" => Key::PageDown,
        "Left" => Key::LeftArrow,
        "Right" => Key::RightArrow,
        "Up" => Key::UpArrow,
        "Down" => Key::DownArrow,
        "space" => Key::Space,
        "Shift_L" | "Shift_R" => Key::Shift,
        "Control_L" | "Control_R" => Key::Control,
        "Alt_L" | "Alt_R" => Key::Alt,
        "Super_L" | "Super_R" => Key::Meta,
        "Caps_Lock" => Key::CapsLock,
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Key::Unicode(ch),
                _ => {
                    let code = if code != 0 { code } else { keysym_for(other)? };
                    Key::Other(code)
                }
            }
        }
    };
    Some(key)
}

/// Global keyboard hook backed by `rdev::grab`.
///
/// The grab thread starts on first registration and lives for the rest of
/// the process; without a handler every event passes through untouched.
#[derive(Default)]
pub struct RdevKeyListener {
    handler: Arc<Mutex<Option<KeyHandler>>>,
    started: AtomicBool,
}

fn lock_handler(slot: &Mutex<Option<KeyHandler>>) -> MutexGuard<'_, Option<KeyHandler>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RdevKeyListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_thread(&self) -> Result<(), InputError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let slot = self.handler.clone();
        let spawned = thread::Builder::new()
            .name("ocrdesk-keyhook".into())
            .spawn(move || {
                let callback = move |event: Event| -> Option<Event> {
                    let Some(stroke) = stroke_from_event(&event) else {
                        return Some(event);
                    };
                    let mut guard = lock_handler(&slot);
                    let Some(handler) = guard.as_mut() else {
                        return Some(event);
                    };
                    match handler(&stroke) {
                        KeyDisposition::Forward => Some(event),
                        KeyDisposition::Swallow => None,
                        KeyDisposition::Release => {
                            *guard = None;
                            None
                        }
                    }
                };
                if let Err(err) = grab(callback) {
                    log_error!("global key hook failed: {err:?}");
                }
            });

        if let Err(err) = spawned {
            self.started.store(false, Ordering::SeqCst);
            return Err(InputError::Unavailable(format!("failed to spawn key hook thread: {err}")));
        }
        Ok(())
    }
}

impl KeyListener for RdevKeyListener {
    fn register(&self, handler: KeyHandler) -> Result<(), InputError> {
        {
            let mut slot = lock_handler(&self.handler);
            if slot.is_some() {
                return Err(InputError::HandlerRegistered);
            }
            *slot = Some(handler);
        }
        if let Err(err) = self.ensure_thread() {
            lock_handler(&self.handler).take();
            return Err(err);
        }
        Ok(())
    }

    fn deregister(&self) -> Result<(), InputError> {
        if lock_handler(&self.handler).take().is_none() {
            log_warn!("key hook had no handler to remove");
        }
        Ok(())
    }

    fn is_registered(&self) -> bool {
        lock_handler(&self.handler).is_some()
    }
}

fn stroke_from_event(event: &Event) -> Option<KeyStroke> {
    let (key, phase) = match event.event_type {
        EventType::KeyPress(key) => (key, KeyPhase::Press),
        EventType::KeyRelease(key) => (key, KeyPhase::Release),
        _ => return None,
    };

    let symbol = match key_symbol(&key) {
        Some(symbol) => symbol.to_string(),
        None => match event.name.as_deref() {
            Some(name) if !name.is_empty() && !name.chars().any(char::is_control) => name.to_string(),
            _ => format!("{key:?}"),
        },
    };
    let code = match key {
        rdev::Key::Unknown(code) => code,
        _ => 0,
    };
    Some(KeyStroke::new(code, symbol, phase))
}

/// Keysym names for keys that do not produce text.
fn key_symbol(key: &rdev::Key) -> Option<&'static str> {
    use rdev::Key as K;
    match key {
        K::Return | K::KpReturn => Some("Return"),
        K::Tab => Some("Tab"),
        K::Escape => Some("Escape"),
        K::Backspace => Some("BackSpace"),
        K::Delete => Some("Delete"),
        K::Insert => Some("Insert"),
        K::Home => Some("Home"),
        K::End => Some("End"),
        K::PageUp => Some("Page_Up"),
        K::PageDown => Some("Page_Down"),
        K::LeftArrow => Some("Left"),
        K::RightArrow => Some("Right"),
        K::UpArrow => Some("Up"),
        K::DownArrow => Some("Down"),
        K::Space => Some("space"),
        K::ShiftLeft => Some("Shift_L"),
        K::ShiftRight => Some("Shift_R"),
        K::ControlLeft => Some("Control_L"),
        K::ControlRight => Some("Control_R"),
        K::Alt => Some("Alt_L"),
        K::AltGr => Some("ISO_Level3_Shift"),
        K::MetaLeft => Some("Super_L"),
        K::MetaRight => Some("Super_R"),
        K::CapsLock => Some("Caps_Lock"),
        K::F1 => Some("F1"),
        K::F2 => Some("F2"),
        K::F3 => Some("F3"),
        K::F4 => Some("F4"),
        K::F5 => Some("F5"),
        K::F6 => Some("F6"),
        K::F7 => Some("F7"),
        K::F8 => Some("F8"),
        K::F9 => Some("F9"),
        K::F10 => Some("F10"),
        K::F11 => Some("F11"),
        K::F12 => Some("F12"),
        _ => None,
    }
}
