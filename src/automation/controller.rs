use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::error::AutomationError;
use super::event::PointerAction;
use super::input::{InputInjector, KeyDisposition, KeyListener, KeyStroke};
use super::player::{inject_key, AutomationPlayer, PlaybackHandle, PlaybackReport};
use super::recorder::AutomationRecorder;
use super::send_keys::SendKeySession;
use super::state::ControllerState;
use super::store::EventLog;
use crate::settings::AutomationSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug)]
pub enum ActionOutcome {
    /// Appended to the active log.
    Recorded,
    /// Injected on a background task.
    Dispatched(JoinHandle<()>),
}

/// Arming, recording, playback and the active log.
///
/// Immediate actions and playback are spawned on the current Tokio runtime.
#[derive(Clone)]
pub struct AutomationController {
    state: Arc<Mutex<ControllerState>>,
    log: EventLog,
    recorder: AutomationRecorder,
    player: AutomationPlayer,
    injector: Arc<dyn InputInjector>,
    pointer_settle: Duration,
    playback: Arc<Mutex<Option<CancellationToken>>>,
    send_keys_active: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AutomationController {
    pub fn new(log: EventLog, injector: Arc<dyn InputInjector>, settings: &AutomationSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            recorder: AutomationRecorder::new(log.clone(), settings.recorded_delay_secs),
            player: AutomationPlayer::new(injector.clone(), settings),
            log,
            injector,
            pointer_settle: settings.pointer_settle(),
            playback: Arc::new(Mutex::new(None)),
            send_keys_active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ControllerState {
        *lock(&self.state)
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn has_log(&self) -> bool {
        self.log.is_loaded()
    }

    pub fn set_armed(&self, armed: bool) -> Result<ControllerState, AutomationError> {
        let mut state = lock(&self.state);
        if state.is_running() {
            return Err(AutomationError::Busy);
        }
        *state = if armed {
            ControllerState::Armed
        } else {
            ControllerState::Idle
        };
        log_debug!("controller state: {:?}", *state);
        Ok(*state)
    }

    pub fn toggle_armed(&self) -> Result<ControllerState, AutomationError> {
        let armed = self.state().is_armed();
        self.set_armed(!armed)
    }

    /// Record the pointer action when armed, otherwise perform it after the
    /// settle delay. Arming is kept, so several clicks can be captured in a row.
    pub fn pointer_action(
        &self,
        x: i32,
        y: i32,
        action: PointerAction,
    ) -> Result<ActionOutcome, AutomationError> {
        match self.state() {
            ControllerState::Running => Err(AutomationError::Busy),
            ControllerState::Armed => {
                self.recorder.record_pointer(x, y, action)?;
                Ok(ActionOutcome::Recorded)
            }
            ControllerState::Idle => {
                let injector = self.injector.clone();
                let settle = self.pointer_settle;
                let action = if action == PointerAction::None {
                    PointerAction::Move
                } else {
                    action
                };
                let handle = tokio::spawn(async move {
                    time::sleep(settle).await;
                    if let Err(err) = injector.pointer(x, y, action) {
                        log_error!("pointer {} at ({x}, {y}) failed: {err}", action.token());
                    }
                });
                Ok(ActionOutcome::Dispatched(handle))
            }
        }
    }

    pub fn key_action(&self, stroke: KeyStroke) -> Result<ActionOutcome, AutomationError> {
        match self.state() {
            ControllerState::Running => Err(AutomationError::Busy),
            ControllerState::Armed => {
                self.recorder.record_key(&stroke)?;
                Ok(ActionOutcome::Recorded)
            }
            ControllerState::Idle => {
                let injector = self.injector.clone();
                let handle = tokio::spawn(async move {
                    match inject_key(injector.as_ref(), stroke.code, &stroke.symbol, stroke.phase) {
                        Ok(true) => {}
                        Ok(false) => log_debug!("ignored key without code or symbol"),
                        Err(err) => log_error!("key {:?} failed: {err}", stroke.symbol),
                    }
                });
                Ok(ActionOutcome::Dispatched(handle))
            }
        }
    }

    /// Play the active log. Fails without touching the state when no log exists.
    pub fn run(&self) -> Result<PlaybackHandle, AutomationError> {
        {
            let mut state = lock(&self.state);
            if state.is_running() {
                return Err(AutomationError::Busy);
            }
            if !self.log.is_loaded() {
                log_info!("run requested with no macro loaded");
                return Err(AutomationError::NoLogAvailable);
            }
            *state = ControllerState::Running;
        }

        let cancel = CancellationToken::new();
        *lock(&self.playback) = Some(cancel.clone());

        let state = self.state.clone();
        let playback = self.playback.clone();
        let on_finish = move |report: &PlaybackReport| {
            *lock(&state) = ControllerState::Idle;
            lock(&playback).take();
            log_debug!("controller back to idle after {report:?}");
        };

        match self.player.start(&self.log, cancel, on_finish) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                *lock(&self.state) = ControllerState::Idle;
                lock(&self.playback).take();
                Err(AutomationError::Store(err))
            }
        }
    }

    /// Returns false when nothing is playing.
    pub fn cancel_playback(&self) -> bool {
        match lock(&self.playback).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn load_log(&self, source: &Path) -> Result<(), AutomationError> {
        self.ensure_not_running()?;
        Ok(self.log.load_from(source)?)
    }

    pub fn save_log(&self, destination: &Path) -> Result<bool, AutomationError> {
        Ok(self.log.save_to(destination)?)
    }

    pub fn unload_log(&self) -> Result<(), AutomationError> {
        self.ensure_not_running()?;
        Ok(self.log.unload()?)
    }

    /// Install `handler` on the global key hook until the sentinel key.
    ///
    /// While armed, keys are recorded and swallowed and the sentinel also
    /// disarms; otherwise keys pass through to the focused application.
    pub fn enter_send_keys(
        &self,
        listener: Arc<dyn KeyListener>,
    ) -> Result<SendKeySession, AutomationError> {
        self.ensure_not_running()?;
        if self.send_keys_active.swap(true, Ordering::SeqCst) {
            return Err(AutomationError::SendKeysActive);
        }

        let state = self.state.clone();
        let recorder = self.recorder.clone();
        let active = self.send_keys_active.clone();
        let handler = Box::new(move |stroke: &KeyStroke| {
            if stroke.is_sentinel() {
                active.store(false, Ordering::SeqCst);
                let mut state = lock(&state);
                if state.is_armed() {
                    *state = ControllerState::Idle;
                }
                log_info!("send-key mode ended by {}", stroke.symbol);
                return KeyDisposition::Release;
            }

            if lock(&state).is_armed() {
                if let Err(err) = recorder.record_key(stroke) {
                    log_error!("failed to record key {:?}: {err:#}", stroke.symbol);
                }
                KeyDisposition::Swallow
            } else {
                KeyDisposition::Forward
            }
        });

        if let Err(err) = listener.register(handler) {
            self.send_keys_active.store(false, Ordering::SeqCst);
            return Err(err.into());
        }
        log_info!("send-key mode started, press F4 to leave");
        Ok(SendKeySession::new(listener, self.send_keys_active.clone()))
    }

    fn ensure_not_running(&self) -> Result<(), AutomationError> {
        if self.state().is_running() {
            return Err(AutomationError::Busy);
        }
        Ok(())
    }
}
