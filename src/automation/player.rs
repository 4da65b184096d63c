use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::event::{AutomationEvent, KeyPhase, PointerAction};
use super::input::{InputError, InputInjector};
use super::keysym::keysym_for;
use super::store::EventLog;
use crate::settings::AutomationSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub executed: usize,
    /// Unparseable lines plus events that could not be resolved.
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Finished(PlaybackReport),
    /// The active log vanished before playback reported completion.
    LogRemoved,
}

/// Injects a key, resolving code 0 through the keysym table.
/// Returns `Ok(false)` when the event carries neither code nor symbol.
pub(crate) fn inject_key(
    injector: &dyn InputInjector,
    code: u32,
    symbol: &str,
    phase: KeyPhase,
) -> Result<bool, InputError> {
    if code == 0 && symbol.is_empty() {
        return Ok(false);
    }
    let code = if code == 0 {
        keysym_for(symbol).unwrap_or_else(|| {
            log_debug!("no keysym for {symbol:?}, injecting by symbol");
            0
        })
    } else {
        code
    };
    injector.key(code, symbol, phase)?;
    Ok(true)
}

#[derive(Clone)]
pub struct AutomationPlayer {
    injector: Arc<dyn InputInjector>,
    poll_interval: Duration,
    grace: Duration,
}

impl AutomationPlayer {
    pub fn new(injector: Arc<dyn InputInjector>, settings: &AutomationSettings) -> Self {
        Self {
            injector,
            poll_interval: settings.log_poll_interval(),
            grace: settings.completion_grace(),
        }
    }

    /// Read `log` in full and play it on a background task.
    ///
    /// `on_finish` runs on that task once the last event has executed (or
    /// playback was cancelled), before the completion signal is sent.
    pub fn start<F>(&self, log: &EventLog, cancel: CancellationToken, on_finish: F) -> Result<PlaybackHandle>
    where
        F: FnOnce(&PlaybackReport) + Send + 'static,
    {
        let parsed = log.parse()?.ok_or_else(|| anyhow!("no macro is loaded"))?;
        for skipped in &parsed.skipped {
            log_debug!("skipping line {} {:?}: {}", skipped.number, skipped.line, skipped.error);
        }
        log_info!(
            "playing {} events ({} unreadable lines skipped)",
            parsed.events.len(),
            parsed.skipped.len()
        );

        let (finished_tx, finished_rx) = watch::channel(false);
        let injector = self.injector.clone();
        let task_cancel = cancel.clone();
        let events = parsed.events;
        let unreadable = parsed.skipped.len();

        let task = tokio::spawn(async move {
            let mut report = play_events(&events, injector.as_ref(), &task_cancel).await;
            report.skipped += unreadable;
            on_finish(&report);
            let _ = finished_tx.send(true);
            report
        });

        Ok(PlaybackHandle {
            task,
            finished: finished_rx,
            cancel,
            log: log.clone(),
            poll_interval: self.poll_interval,
            grace: self.grace,
        })
    }
}

async fn play_events(
    events: &[AutomationEvent],
    injector: &dyn InputInjector,
    cancel: &CancellationToken,
) -> PlaybackReport {
    let mut report = PlaybackReport::default();

    for event in events {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let result = match event {
            AutomationEvent::Delay { seconds } => {
                let pause = Duration::try_from_secs_f64(*seconds).unwrap_or_default();
                tokio::select! {
                    _ = time::sleep(pause) => Ok(true),
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                }
            }
            AutomationEvent::Pointer { x, y, action } => {
                injector
                    .pointer(*x, *y, PointerAction::Move)
                    .and_then(|_| {
                        if action.presses_button() {
                            injector.pointer(*x, *y, *action)
                        } else {
                            Ok(())
                        }
                    })
                    .map(|_| true)
            }
            AutomationEvent::Key {
                code,
                symbol,
                phase,
            } => inject_key(injector, *code, symbol, *phase),
        };

        match result {
            Ok(true) => report.executed += 1,
            Ok(false) => {
                log_debug!("skipping key event without code or symbol");
                report.skipped += 1;
            }
            Err(err) => {
                log_error!("failed to inject {event}: {err}");
                report.failed += 1;
            }
        }
    }

    if report.cancelled {
        log_warn!("playback cancelled after {} events", report.executed);
    } else {
        log_info!("playback finished: {} events executed", report.executed);
    }
    report
}

/// Foreground view of a running playback.
pub struct PlaybackHandle {
    task: JoinHandle<PlaybackReport>,
    finished: watch::Receiver<bool>,
    cancel: CancellationToken,
    log: EventLog,
    poll_interval: Duration,
    grace: Duration,
}

impl PlaybackHandle {
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for completion, or for the active log to disappear, then sleep
    /// the grace period.
    pub async fn wait(self) -> WaitOutcome {
        let PlaybackHandle {
            task,
            mut finished,
            log,
            poll_interval,
            grace,
            ..
        } = self;

        let mut ticker = time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let completed = loop {
            tokio::select! {
                // An Err here means the task is gone; the join below reports it.
                _ = finished.wait_for(|done| *done) => break true,
                _ = ticker.tick() => {
                    if !log.is_loaded() {
                        break false;
                    }
                }
            }
        };

        let outcome = if completed {
            match task.await {
                Ok(report) => WaitOutcome::Finished(report),
                Err(err) => {
                    log_error!("playback task failed: {err}");
                    WaitOutcome::Finished(PlaybackReport {
                        cancelled: true,
                        ..PlaybackReport::default()
                    })
                }
            }
        } else {
            log_info!("active macro removed while waiting for playback");
            WaitOutcome::LogRemoved
        };

        time::sleep(grace).await;
        outcome
    }
}
