//! Audio through the default output device.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;

use parking_lot::Mutex;
use ::rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::{AudioOutput, Playback, PlaybackError};
use crate::store::AudioSource;
use crate::tracing::prelude::*;

pub struct RodioAudio {
    handle: OutputStreamHandle,
    default_sound: Option<PathBuf>,
    current: Arc<Mutex<Option<Arc<Sink>>>>,
    // The stream itself is not `Send`; it lives on its own thread until
    // this sender is dropped.
    _keepalive: mpsc::Sender<()>,
}

impl RodioAudio {
    /// Open the default output device.
    pub fn open_default_device(default_sound: Option<PathBuf>) -> Result<Self, PlaybackError> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (keepalive, keepalive_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    let _ = handle_tx.send(Ok(handle));
                    // Returns once the sender side is dropped.
                    let _ = keepalive_rx.recv();
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| PlaybackError::new("output device", e))?;

        let handle = handle_rx
            .recv()
            .map_err(|e| PlaybackError::new("output device", e))?
            .map_err(|e| PlaybackError::new("output device", e))?;

        Ok(Self {
            handle,
            default_sound,
            current: Arc::new(Mutex::new(None)),
            _keepalive: keepalive,
        })
    }

    fn play(&self, label: &str, path: &Path) -> Result<Box<dyn Playback>, PlaybackError> {
        let file = File::open(path).map_err(|e| PlaybackError::new(label, e))?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::new(label, e))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::new(label, e))?;

        sink.set_volume(1.0);
        sink.append(decoder.repeat_infinite());
        sink.play();

        let sink = Arc::new(sink);
        *self.current.lock() = Some(sink.clone());
        info!(sound = %path.display(), "Playing");

        Ok(Box::new(RodioPlayback {
            sink,
            current: self.current.clone(),
        }))
    }
}

impl AudioOutput for RodioAudio {
    fn request_focus(&self) {
        // A desktop mixer has no focus arbitration; pause anything stale.
        if let Some(sink) = self.current.lock().as_ref() {
            sink.stop();
        }
    }

    fn release_focus(&self) {}

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
        if let Some(sink) = self.current.lock().as_ref() {
            sink.set_volume(1.0);
        }
    }
}

struct RodioPlayback {
    sink: Arc<Sink>,
    current: Arc<Mutex<Option<Arc<Sink>>>>,
}

impl Playback for RodioPlayback {
    fn stop(self: Box<Self>) {
        self.sink.stop();
        let mut current = self.current.lock();
        if current
            .as_ref()
            .is_some_and(|sink| Arc::ptr_eq(sink, &self.sink))
        {
            *current = None;
        }
        debug!("Playback stopped");
    }
}
