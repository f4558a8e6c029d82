//! Backends for a machine without a sound device or a screen.
//!
//! Audio checks that the sound file exists and logs what it would play,
//! which keeps fallback behavior observable. The alert surface is the log.

use std::path::{Path, PathBuf};

use super::{AlertSurface, AudioOutput, Indication, Playback, PlaybackError};
use crate::store::AudioSource;
use crate::tracing::prelude::*;

#[derive(Debug, Default)]
pub struct HeadlessAudio {
    default_sound: Option<PathBuf>,
}

impl HeadlessAudio {
    pub fn new(default_sound: Option<PathBuf>) -> Self {
        Self { default_sound }
    }

    fn play(&self, label: &str, path: &Path) -> Result<Box<dyn Playback>, PlaybackError> {
        if !path.is_file() {
            return Err(PlaybackError::new(label, "no such file"));
        }
        info!(sound = %path.display(), "Playing (headless)");
        Ok(Box::new(LoggedPlayback {
            path: path.to_path_buf(),
        }))
    }
}

impl AudioOutput for HeadlessAudio {
    fn request_focus(&self) {
        debug!("Audio focus requested (headless)");
    }

    fn release_focus(&self) {
        debug!("Audio focus released (headless)");
    }

    fn open(&self, source: &AudioSource) -> Result<Box<dyn Playback>, PlaybackError> {
        self.play(source.as_str(), Path::new(source.as_str()))
    }

    fn open_default(&self) -> Result<Box<dyn Playback>, PlaybackError> {
        match &self.default_sound {
            Some(path) => self.play("default sound", path),
            None => Err(PlaybackError::new(
                "default sound",
                "QRALARM_DEFAULT_SOUND not set",
            )),
        }
    }

    fn force_max_volume(&self) {
        trace!("Volume forced to max (headless)");
    }
}

struct LoggedPlayback {
    path: PathBuf,
}

impl Playback for LoggedPlayback {
    fn stop(self: Box<Self>) {
        info!(sound = %self.path.display(), "Playback stopped (headless)");
    }
}

/// Writes the alert to the log at warn level so it stands out.
#[derive(Debug, Default)]
pub struct LogAlertSurface;

impl AlertSurface for LogAlertSurface {
    fn show(&self) {
        warn!("ALARM RINGING: scan the enrolled QR code to stop it");
    }

    fn indicate(&self, indication: Indication) {
        match indication {
            Indication::NotMatching => warn!("Scanned code does not match, scan the enrolled one"),
            Indication::NothingEnrolled => {
                warn!("No code enrolled; the alarm will stop at its auto-stop deadline")
            }
        }
    }

    fn dismiss(&self) {
        info!("Alarm alert dismissed");
    }
}
