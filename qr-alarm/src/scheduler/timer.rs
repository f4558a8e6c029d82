//! Exact wake timer.
//!
//! One registration slot. Registering replaces whatever was pending, so at
//! most one wake-up is ever outstanding.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::tracing::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("wake timer unavailable: {0}")]
pub struct TimerError(pub String);

/// Whatever should happen when the timer goes off.
#[async_trait]
pub trait WakeTarget: Send + Sync {
    async fn fire(&self);
}

pub trait WakeTimer: Send + Sync {
    /// Whether the platform lets us wake at a precise instant.
    fn can_schedule_exact(&self) -> bool;

    /// Arm the timer for `at`, replacing any pending registration.
    fn register(&self, at: OffsetDateTime) -> Result<(), TimerError>;

    /// Drop the pending registration. Returns whether there was one.
    fn cancel(&self) -> bool;

    /// The instant of the pending registration, if any.
    fn pending(&self) -> Option<OffsetDateTime>;
}

struct Registration {
    at: OffsetDateTime,
    id: u64,
    task: JoinHandle<()>,
}

/// Wake timer backed by a sleeping tokio task.
///
/// Sleeps on the monotonic clock for the wall-clock distance measured at
/// registration time.
pub struct TokioWakeTimer {
    runtime: Handle,
    target: Arc<dyn WakeTarget>,
    clock: Arc<dyn Clock>,
    slot: Arc<Mutex<Option<Registration>>>,
    next_id: AtomicU64,
}

impl TokioWakeTimer {
    pub fn new(runtime: Handle, target: Arc<dyn WakeTarget>, clock: Arc<dyn Clock>) -> Self {
        Self {
            runtime,
            target,
            clock,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }
}

impl WakeTimer for TokioWakeTimer {
    fn can_schedule_exact(&self) -> bool {
        true
    }

    fn register(&self, at: OffsetDateTime) -> Result<(), TimerError> {
        let delay = Duration::try_from(at - self.clock.now()).unwrap_or(Duration::ZERO);
        // Fixed here, not when the task first runs.
        let deadline = Instant::now().checked_add(delay);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            previous.task.abort();
            debug!(at = %previous.at, "Replaced pending wake-up");
        }

        let target = self.target.clone();
        let fired_slot = self.slot.clone();
        let task = self.runtime.spawn(async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
            {
                let mut slot = fired_slot.lock();
                if slot.as_ref().is_some_and(|r| r.id == id) {
                    *slot = None;
                }
            }
            info!(%at, "Wake timer fired");
            target.fire().await;
        });

        *slot = Some(Registration { at, id, task });
        debug!(%at, delay_secs = delay.as_secs(), "Wake-up registered");
        Ok(())
    }

    fn cancel(&self) -> bool {
        match self.slot.lock().take() {
            Some(registration) => {
                registration.task.abort();
                debug!(at = %registration.at, "Wake-up cancelled");
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> Option<OffsetDateTime> {
        self.slot.lock().as_ref().map(|r| r.at)
    }
}
