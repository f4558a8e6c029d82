//! Storage backends for the alarm record.

use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;

use super::model::AlarmConfiguration;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed alarm record: {0}")]
    Format(#[from] serde_json::Error),
}

/// Durable home of the alarm record.
pub trait Persistence: Send + Sync {
    /// Load the stored record, `Ok(None)` if nothing was ever saved.
    fn load(&self) -> Result<Option<AlarmConfiguration>, PersistError>;

    fn save(&self, config: &AlarmConfiguration) -> Result<(), PersistError>;
}

/// JSON file, replaced atomically on every save.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Persistence for JsonFile {
    fn load(&self) -> Result<Option<AlarmConfiguration>, PersistError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, config: &AlarmConfiguration) -> Result<(), PersistError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        // Write beside the target and rename over it so a crash mid-write
        // leaves the previous record intact.
        let tmp = self.path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&tmp, text).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

/// Keeps the record in memory only. Used by tests and by the daemon when
/// `QRALARM_EPHEMERAL` is set.
#[derive(Debug, Default)]
pub struct InMemory {
    saved: Mutex<Option<AlarmConfiguration>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<AlarmConfiguration> {
        self.saved.lock().clone()
    }
}

impl Persistence for InMemory {
    fn load(&self) -> Result<Option<AlarmConfiguration>, PersistError> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, config: &AlarmConfiguration) -> Result<(), PersistError> {
        *self.saved.lock() = Some(config.clone());
        Ok(())
    }
}
