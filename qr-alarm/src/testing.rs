//! Fakes for the platform seams, shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::clock::Clock;
use crate::platform::{AlertSurface, AudioOutput, Indication, Playback, PlaybackError};
use crate::scheduler::{TimerError, WakeTimer};
use crate::store::AudioSource;

/// Wall clock that only moves when told to.
pub struct FixedClock(Mutex<OffsetDateTime>);

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.0.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    FocusRequested,
    FocusReleased,
    Started(String),
    Stopped(String),
    MaxVolume,
}

/// Audio output that records every call.
#[derive(Default)]
pub struct RecordingAudio {
    events: Arc<Mutex<Vec<AudioEvent>>>,
    broken: Mutex<Vec<String>>,
    default_broken: AtomicBool,
}

impl RecordingAudio {
    /// Label recorded when the default sound starts.
    pub const DEFAULT: &'static str = "default";

    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening `source` fail.
    pub fn break_source(&self, source: &str) {
        self.broken.lock().push(source.to_string());
    }

    pub fn break_default(&self) {
        self.default_broken.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().clone()
    }

    pub fn volume_forcings(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| **e == AudioEvent::MaxVolume)
            .count()
    }

    /// What is playing right now, if anything.
    pub fn playing(&self) -> Option<String> {
        let mut current = None;
        for event in self.events.lock().iter() {
            match event {
                AudioEvent::Started(label) => current = Some(label.clone()),
                AudioEvent::Stopped(_) => current = None,
                _ => {}
            }
        }
        current
    }

    fn start(&self, label: &str) -> Box<dyn Playback> {
        self.events
            .lock()
            .push(AudioEvent::Started(label.to_string()));
        Box::new(RecordingPlayback {
            label: label.to_string(),
            events: self.events.clone(),
        })
    }
}

impl AudioOutput for RecordingAudio {
    fn request_focus(&self) {
        self.events.lock().push(AudioEvent::FocusRequested);
    }

    fn release_focus(&self) {
        self.events.lock().push(AudioEvent::FocusReleased);
    }

    fn open(&self, source: &AudioSource) -> Result<Box<dyn Playback>, PlaybackError> {
        if self.broken.lock().iter().any(|s| s == source.as_str()) {
            return Err(PlaybackError::new(source.as_str(), "broken on purpose"));
        }
        Ok(self.start(source.as_str()))
    }

    fn open_default(&self) -> Result<Box<dyn Playback>, PlaybackError> {
        if self.default_broken.load(Ordering::SeqCst) {
            return Err(PlaybackError::new(Self::DEFAULT, "broken on purpose"));
        }
        Ok(self.start(Self::DEFAULT))
    }

    fn force_max_volume(&self) {
        self.events.lock().push(AudioEvent::MaxVolume);
    }
}

struct RecordingPlayback {
    label: String,
    events: Arc<Mutex<Vec<AudioEvent>>>,
}

impl Playback for RecordingPlayback {
    fn stop(self: Box<Self>) {
        self.events.lock().push(AudioEvent::Stopped(self.label));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    Shown,
    Indicated(Indication),
    Dismissed,
}

#[derive(Default)]
pub struct RecordingAlert {
    events: Mutex<Vec<AlertEvent>>,
}

impl RecordingAlert {
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().clone()
    }
}

impl AlertSurface for RecordingAlert {
    fn show(&self) {
        self.events.lock().push(AlertEvent::Shown);
    }

    fn indicate(&self, indication: Indication) {
        self.events.lock().push(AlertEvent::Indicated(indication));
    }

    fn dismiss(&self) {
        self.events.lock().push(AlertEvent::Dismissed);
    }
}

/// Wake timer that only records registrations.
pub struct ManualTimer {
    permitted: AtomicBool,
    pending: Mutex<Option<OffsetDateTime>>,
    registrations: AtomicUsize,
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self {
            permitted: AtomicBool::new(true),
            pending: Mutex::new(None),
            registrations: AtomicUsize::new(0),
        }
    }
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }

    /// Total number of `register` calls so far.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl WakeTimer for ManualTimer {
    fn can_schedule_exact(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    fn register(&self, at: OffsetDateTime) -> Result<(), TimerError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *self.pending.lock() = Some(at);
        Ok(())
    }

    fn cancel(&self) -> bool {
        self.pending.lock().take().is_some()
    }

    fn pending(&self) -> Option<OffsetDateTime> {
        *self.pending.lock()
    }
}
