//! The ringing session: `Idle -> Ringing -> Idle`.
//!
//! A single [`SessionManager`] task owns the session. It starts one on a
//! wake-up, keeps the output at full volume, and tears it down on the first
//! of: a matching scan, the auto-stop deadline, an explicit stop, or daemon
//! shutdown. Teardown is idempotent, so racing stop triggers are harmless.
//!
//! Scans are compared off the session loop by a per-session
//! [`DismissalVerifier`]; its verdicts come back as messages and are
//! dropped if the session they belong to is already over.

mod manager;
mod verifier;

pub use manager::SessionManager;
pub use verifier::{DismissalVerifier, ScanFeed, ScanFrame, ScanOutcome, scan_channel};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use utoipa::ToSchema;

use manager::SessionCommand;
use crate::platform::Indication;
use crate::scheduler::WakeTarget;
use crate::store::Missing;
use crate::tracing::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot ring without {0}")]
    ConfigurationIncomplete(Missing),

    #[error("alarm is not enabled")]
    NotEnabled,

    #[error("session manager is not running")]
    Closed,
}

/// Why a ringing session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The enrolled code was scanned.
    Dismissed,
    /// Nobody dismissed it before the auto-stop deadline.
    AutoStop,
    /// Stopped through the alert's stop affordance or the API.
    Explicit,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle {
        last_stop: Option<StopReason>,
    },
    Ringing {
        since: OffsetDateTime,
        auto_stop_at: OffsetDateTime,
        /// Feedback from the latest scan that did not dismiss.
        indication: Option<Indication>,
    },
}

impl SessionState {
    pub fn is_ringing(&self) -> bool {
        matches!(self, SessionState::Ringing { .. })
    }
}

/// What happened to a submitted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanSubmit {
    /// Handed to the verifier.
    Accepted,
    /// Dropped: another scan is still being compared.
    Busy,
    NotRinging,
}

/// Cheap, cloneable access to the session manager.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<SessionState>,
    feed_rx: watch::Receiver<Option<ScanFeed>>,
}

impl SessionHandle {
    fn new(
        cmd_tx: mpsc::Sender<SessionCommand>,
        state_rx: watch::Receiver<SessionState>,
        feed_rx: watch::Receiver<Option<ScanFeed>>,
    ) -> Self {
        Self {
            cmd_tx,
            state_rx,
            feed_rx,
        }
    }

    /// Start ringing. A wake-up while already ringing does nothing.
    pub async fn wake(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Wake { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Stop ringing. Returns `false` if nothing was ringing.
    pub async fn stop(&self) -> bool {
        self.stop_with(StopReason::Explicit).await
    }

    async fn stop_with(&self, reason: StopReason) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(SessionCommand::Stop { reason, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Offer a decoded payload to the current session's verifier.
    pub fn submit_scan(&self, payload: impl Into<String>) -> ScanSubmit {
        let feed = self.feed_rx.borrow().clone();
        match feed {
            None => ScanSubmit::NotRinging,
            Some(feed) if feed.offer(payload) => ScanSubmit::Accepted,
            Some(_) => ScanSubmit::Busy,
        }
    }
}

#[async_trait]
impl WakeTarget for SessionHandle {
    async fn fire(&self) {
        if let Err(e) = self.wake().await {
            debug!(error = %e, "Wake-up did not start a session");
        }
    }
}
