use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ::time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::verifier::{DismissalVerifier, ScanFeed, ScanOutcome, scan_channel};
use super::{SessionError, SessionHandle, SessionState, StopReason};
use crate::clock::Clock;
use crate::config::RingingConfig;
use crate::platform::{AlertSurface, AudioOutput, Indication, Playback};
use crate::store::{AlarmConfiguration, ConfigStore};
use crate::tracing::prelude::*;

const COMMAND_QUEUE: usize = 16;

pub(crate) enum SessionCommand {
    Wake {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reason: StopReason,
        reply: oneshot::Sender<bool>,
    },
    ScanResult {
        generation: u64,
        outcome: ScanOutcome,
    },
}

/// Everything a ringing alarm holds. Dropping it cancels the volume
/// enforcer, the watchdog and the verifier together.
struct RingingSession {
    generation: u64,
    playback: Option<Box<dyn Playback>>,
    volume_enforcer: Interval,
    auto_stop: Pin<Box<Sleep>>,
    verifier_guard: DropGuard,
}

enum Due {
    AutoStop,
    EnforceVolume,
}

/// Actor owning the ringing session.
///
/// Nothing else touches the session; the rest of the daemon talks to it
/// through a [`SessionHandle`].
pub struct SessionManager {
    store: Arc<ConfigStore>,
    audio: Arc<dyn AudioOutput>,
    alert: Arc<dyn AlertSurface>,
    clock: Arc<dyn Clock>,
    config: RingingConfig,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    // Weak so that dropping every handle still closes the queue.
    results_tx: mpsc::WeakSender<SessionCommand>,
    state_tx: watch::Sender<SessionState>,
    feed_tx: watch::Sender<Option<ScanFeed>>,
    session: Option<RingingSession>,
    generation: u64,
}

impl SessionManager {
    pub fn new(
        store: Arc<ConfigStore>,
        audio: Arc<dyn AudioOutput>,
        alert: Arc<dyn AlertSurface>,
        clock: Arc<dyn Clock>,
        config: RingingConfig,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle { last_stop: None });
        let (feed_tx, feed_rx) = watch::channel(None);

        let manager = Self {
            store,
            audio,
            alert,
            clock,
            config: config.bounded(),
            cmd_rx,
            results_tx: cmd_tx.downgrade(),
            state_tx,
            feed_tx,
            session: None,
            generation: 0,
        };
        let handle = SessionHandle::new(cmd_tx, state_rx, feed_rx);
        (manager, handle)
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        trace!("Session manager started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.exit(StopReason::Shutdown);
                    break;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        self.exit(StopReason::Shutdown);
                        break;
                    };
                    self.handle(cmd);
                }
                due = next_due(&mut self.session) => match due {
                    Due::AutoStop => {
                        warn!("Alarm was not dismissed in time, stopping");
                        self.exit(StopReason::AutoStop);
                    }
                    Due::EnforceVolume => self.audio.force_max_volume(),
                },
            }
        }
        trace!("Session manager stopped");
    }

    fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Wake { reply } => {
                let result = self.enter();
                if let Err(e) = &result {
                    warn!(error = %e, "Alarm did not start");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reason, reply } => {
                let _ = reply.send(self.exit(reason));
            }
            SessionCommand::ScanResult {
                generation,
                outcome,
            } => self.scan_result(generation, outcome),
        }
    }

    fn enter(&mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            debug!("Already ringing, wake-up ignored");
            return Ok(());
        }

        let config = self.store.read();
        if !config.enabled {
            return Err(SessionError::NotEnabled);
        }
        config
            .check_ringable()
            .map_err(SessionError::ConfigurationIncomplete)?;

        let since = self.clock.now();
        let auto_stop_at = auto_stop_deadline(since, self.config.auto_stop_after);

        // One-shot: the trigger is consumed as the alarm goes off.
        self.store.set_active(true);
        self.store.clear_trigger();

        self.audio.request_focus();
        let playback = self.start_playback(&config);
        self.alert.show();
        self.audio.force_max_volume();

        self.generation += 1;
        let generation = self.generation;
        let period = self.config.volume_interval;
        let mut volume_enforcer = time::interval_at(Instant::now() + period, period);
        volume_enforcer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let auto_stop = Box::pin(time::sleep(self.config.auto_stop_after));

        let verifier = CancellationToken::new();
        let (feed, frames) = scan_channel();
        match self.results_tx.upgrade() {
            Some(results) => {
                tokio::spawn(DismissalVerifier::new(self.store.clone()).run(
                    frames,
                    generation,
                    results,
                    verifier.clone(),
                ));
                self.feed_tx.send_replace(Some(feed));
            }
            None => warn!("Session handles are gone, scans cannot be delivered"),
        }

        self.session = Some(RingingSession {
            generation,
            playback,
            volume_enforcer,
            auto_stop,
            verifier_guard: verifier.drop_guard(),
        });

        self.state_tx.send_replace(SessionState::Ringing {
            since,
            auto_stop_at,
            indication: None,
        });
        info!(generation, %auto_stop_at, "Alarm ringing");
        Ok(())
    }

    /// Configured sound, then the default, then silence. Ringing goes on
    /// either way.
    fn start_playback(&self, config: &AlarmConfiguration) -> Option<Box<dyn Playback>> {
        if let Some(source) = &config.audio_source {
            match self.audio.open(source) {
                Ok(playback) => return Some(playback),
                Err(e) => warn!(error = %e, "Falling back to default alarm sound"),
            }
        }
        match self.audio.open_default() {
            Ok(playback) => Some(playback),
            Err(e) => {
                error!(error = %e, "No alarm sound available, ringing silently");
                None
            }
        }
    }

    /// Tear the session down. Returns `false` if there was nothing to stop.
    fn exit(&mut self, reason: StopReason) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let RingingSession {
            generation,
            playback,
            volume_enforcer,
            auto_stop,
            verifier_guard,
        } = session;

        drop(verifier_guard);
        self.feed_tx.send_replace(None);
        if let Some(playback) = playback {
            playback.stop();
        }
        drop(volume_enforcer);
        drop(auto_stop);

        self.audio.release_focus();
        self.alert.dismiss();
        self.store.set_active(false);
        self.state_tx.send_replace(SessionState::Idle {
            last_stop: Some(reason),
        });
        info!(generation, reason = ?reason, "Alarm stopped");
        true
    }

    fn scan_result(&mut self, generation: u64, outcome: ScanOutcome) {
        let current = self.session.as_ref().map(|s| s.generation);
        if current != Some(generation) {
            debug!(generation, "Ignoring scan result from a finished session");
            return;
        }

        match outcome {
            ScanOutcome::Matched => {
                self.exit(StopReason::Dismissed);
            }
            ScanOutcome::NoMatch => self.indicate(Indication::NotMatching),
            ScanOutcome::NoSecretEnrolled => self.indicate(Indication::NothingEnrolled),
            ScanOutcome::AlreadyDismissed => {}
        }
    }

    fn indicate(&mut self, indication: Indication) {
        self.alert.indicate(indication);
        self.state_tx.send_modify(|state| {
            if let SessionState::Ringing {
                indication: current,
                ..
            } = state
            {
                *current = Some(indication);
            }
        });
    }
}

/// Wall time at which a session started at `since` stops by itself.
/// Only reported; the watchdog itself runs on the monotonic clock.
fn auto_stop_deadline(since: OffsetDateTime, after: Duration) -> OffsetDateTime {
    ::time::Duration::try_from(after)
        .ok()
        .and_then(|after| since.checked_add(after))
        .unwrap_or(since)
}

/// Resolves when the watchdog or the volume enforcer is due. Never
/// resolves while idle.
async fn next_due(session: &mut Option<RingingSession>) -> Due {
    let Some(session) = session else {
        return std::future::pending().await;
    };
    tokio::select! {
        biased;
        _ = session.auto_stop.as_mut() => Due::AutoStop,
        _ = session.volume_enforcer.tick() => Due::EnforceVolume,
    }
}
