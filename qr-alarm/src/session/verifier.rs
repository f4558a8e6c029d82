//! Compares scanned payloads with the enrolled code while ringing.
//!
//! Frames come in through a [`ScanFeed`] that holds at most one frame at a
//! time: while a comparison is running, further frames are refused rather
//! than queued. Results go back to the session loop as messages tagged with
//! the session generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::manager::SessionCommand;
use crate::store::ConfigStore;
use crate::tracing::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The payload is the enrolled code. Reported once per session.
    Matched,
    NoMatch,
    NoSecretEnrolled,
    /// A match was already reported for this session.
    AlreadyDismissed,
}

/// A decoded payload waiting for comparison.
///
/// Holding one keeps the feed closed to new frames; dropping it reopens it.
pub struct ScanFrame {
    pub payload: String,
    _slot: InFlight,
}

struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Producer side of a session's scan channel.
#[derive(Clone, Debug)]
pub struct ScanFeed {
    tx: mpsc::Sender<ScanFrame>,
    in_flight: Arc<AtomicBool>,
}

impl ScanFeed {
    /// Hand a decoded payload to the verifier. Returns `false` if the frame
    /// was dropped because a comparison is in flight or the session ended.
    pub fn offer(&self, payload: impl Into<String>) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return false;
        }
        let frame = ScanFrame {
            payload: payload.into(),
            _slot: InFlight(self.in_flight.clone()),
        };
        // On failure the returned frame is dropped here, which reopens the slot.
        self.tx.try_send(frame).is_ok()
    }
}

pub fn scan_channel() -> (ScanFeed, ReceiverStream<ScanFrame>) {
    let (tx, rx) = mpsc::channel(1);
    let feed = ScanFeed {
        tx,
        in_flight: Arc::new(AtomicBool::new(false)),
    };
    (feed, ReceiverStream::new(rx))
}

/// One verifier per ringing session.
pub struct DismissalVerifier {
    store: Arc<ConfigStore>,
    dismissed: AtomicBool,
}

impl DismissalVerifier {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            dismissed: AtomicBool::new(false),
        }
    }

    /// Compare `payload` with the enrolled code. Only reads the store.
    pub fn verify(&self, payload: &str) -> ScanOutcome {
        if self.dismissed.load(Ordering::Acquire) {
            return ScanOutcome::AlreadyDismissed;
        }
        if !self.store.read().has_secret() {
            return ScanOutcome::NoSecretEnrolled;
        }
        if !self.store.verify_secret(payload) {
            return ScanOutcome::NoMatch;
        }
        // Exactly one caller flips the latch.
        if self.dismissed.swap(true, Ordering::AcqRel) {
            ScanOutcome::AlreadyDismissed
        } else {
            ScanOutcome::Matched
        }
    }

    /// Consume frames until cancelled, the feed closes, or a match is
    /// reported.
    pub(crate) async fn run(
        self,
        mut frames: ReceiverStream<ScanFrame>,
        generation: u64,
        results: mpsc::Sender<SessionCommand>,
        cancel: CancellationToken,
    ) {
        trace!(generation, "Verifier started");
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = frames.next() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let outcome = self.verify(&frame.payload);
            drop(frame);
            debug!(generation, outcome = ?outcome, "Scan compared");

            if outcome == ScanOutcome::AlreadyDismissed {
                continue;
            }
            if results
                .send(SessionCommand::ScanResult {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                break;
            }
            if outcome == ScanOutcome::Matched {
                break;
            }
        }
        trace!(generation, "Verifier stopped");
    }
}
