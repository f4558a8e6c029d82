//! Seams to the host platform: audio output and the alert surface.
//!
//! The ringing session only talks to these traits. A backend is picked at
//! startup; tests substitute recording fakes.

mod headless;
#[cfg(feature = "rodio")]
mod rodio;

pub use headless::{HeadlessAudio, LogAlertSurface};
#[cfg(feature = "rodio")]
pub use self::rodio::RodioAudio;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::AudioSource;

#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot play {sound}: {reason}")]
pub struct PlaybackError {
    /// What was being opened: a configured source or "default sound".
    pub sound: String,
    pub reason: String,
}

impl PlaybackError {
    pub fn new(sound: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            sound: sound.into(),
            reason: reason.to_string(),
        }
    }
}

/// An open, looping playback. Dropping it without `stop()` leaves
/// cleanup to the backend; the session always calls `stop()`.
pub trait Playback: Send {
    fn stop(self: Box<Self>);
}

/// Alarm-class audio output.
pub trait AudioOutput: Send + Sync {
    /// Claim exclusive, highest-priority output for the alarm.
    fn request_focus(&self);

    fn release_focus(&self);

    /// Start looping `source`.
    fn open(&self, source: &AudioSource) -> Result<Box<dyn Playback>, PlaybackError>;

    /// Start looping the platform's default alarm sound.
    fn open_default(&self) -> Result<Box<dyn Playback>, PlaybackError>;

    /// Push the alarm channel back to its maximum level.
    fn force_max_volume(&self);
}

/// Feedback shown on the alert surface after a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Indication {
    /// The scanned code is not the enrolled one.
    NotMatching,
    /// There is no enrolled code to compare against.
    NothingEnrolled,
}

/// Full-screen, high-priority alert shown while ringing.
///
/// Its single "stop" affordance is wired to the session's explicit stop
/// path by whoever renders it.
pub trait AlertSurface: Send + Sync {
    fn show(&self);

    fn indicate(&self, indication: Indication);

    fn dismiss(&self);
}
