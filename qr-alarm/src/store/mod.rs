//! Durable, observable store for the single alarm record.
//!
//! The store is the one piece of shared mutable state. The scheduler, the
//! ringing session and the API all go through it. Writes are merges:
//! nothing clears a field it did not explicitly name, so concurrent partial
//! updates from different components cannot clobber each other's fields.
//! The last writer wins on a field both touch.
//!
//! Persistence is best effort. A failed save is logged and the in-memory
//! record stays authoritative.

mod model;
mod persist;

pub use model::{AlarmConfiguration, AudioSource, ConfigUpdate, Missing};
pub use persist::{InMemory, JsonFile, PersistError, Persistence};

use std::convert::Infallible;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::secret::{self, SecretDigest};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("alarm is ringing; configuration is locked until it stops")]
    AlarmActive,

    #[error("dismissal code is empty")]
    EmptySecret,

    #[error("PIN must be {min} to {max} digits", min = secret::PIN_MIN_LEN, max = secret::PIN_MAX_LEN)]
    InvalidPin,
}

pub struct ConfigStore {
    state: watch::Sender<AlarmConfiguration>,
    backend: Box<dyn Persistence>,
    /// Serializes modify-then-save so saves land in write order.
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// Open the store, loading whatever the backend holds.
    ///
    /// An unreadable record is logged and replaced by the default record.
    pub fn open(backend: Box<dyn Persistence>) -> Self {
        let initial = match backend.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("No stored alarm record, starting empty");
                AlarmConfiguration::default()
            }
            Err(e) => {
                warn!(error = %e, "Stored alarm record unreadable, starting empty");
                AlarmConfiguration::default()
            }
        };

        Self {
            state: watch::Sender::new(initial),
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by memory only.
    pub fn in_memory() -> Self {
        Self::open(Box::new(InMemory::new()))
    }

    /// Latest snapshot.
    pub fn read(&self) -> AlarmConfiguration {
        self.state.borrow().clone()
    }

    /// Receiver that sees every subsequent write.
    pub fn subscribe(&self) -> watch::Receiver<AlarmConfiguration> {
        self.state.subscribe()
    }

    /// Merge `update` into the record.
    ///
    /// Writes to the trigger time or the sound are rejected while the
    /// alarm rings.
    pub fn update(&self, update: ConfigUpdate) -> Result<(), ConfigError> {
        self.try_modify(|config| {
            if config.active && update.touches_locked_fields() {
                return Err(ConfigError::AlarmActive);
            }
            update.apply_to(config);
            Ok(())
        })
    }

    pub fn set_active(&self, active: bool) {
        self.modify(|config| config.active = active);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.modify(|config| config.enabled = enabled);
    }

    /// Forget the trigger time and disable the alarm.
    pub fn clear_trigger(&self) {
        self.modify(|config| {
            config.trigger_time = None;
            config.enabled = false;
        });
    }

    /// Enroll a new dismissal code, keeping only its digest.
    pub fn enroll(&self, raw: &str) -> Result<(), ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let digest = SecretDigest::of(raw);
        self.try_modify(|config| {
            if config.active {
                return Err(ConfigError::AlarmActive);
            }
            config.dismissal_secret_hash = Some(digest);
            Ok(())
        })
    }

    /// Compare `candidate` with the enrolled code. `false` when nothing is
    /// enrolled.
    pub fn verify_secret(&self, candidate: &str) -> bool {
        self.state
            .borrow()
            .dismissal_secret_hash
            .as_ref()
            .is_some_and(|digest| !digest.is_empty() && digest.matches(candidate))
    }

    pub fn set_pin(&self, pin: &str) -> Result<(), ConfigError> {
        let pin = pin.trim();
        if !secret::is_valid_pin(pin) {
            return Err(ConfigError::InvalidPin);
        }
        let digest = SecretDigest::of(pin);
        self.modify(|config| config.pin_hash = Some(digest));
        Ok(())
    }

    pub fn verify_pin(&self, candidate: &str) -> bool {
        self.state
            .borrow()
            .pin_hash
            .as_ref()
            .is_some_and(|digest| digest.matches(candidate))
    }

    pub fn clear_pin(&self) {
        self.modify(|config| config.pin_hash = None);
    }

    /// Reset the alarm to its empty state. The PIN survives; it guards
    /// more than the alarm.
    pub fn clear(&self) -> Result<(), ConfigError> {
        self.try_modify(|config| {
            if config.active {
                return Err(ConfigError::AlarmActive);
            }
            *config = AlarmConfiguration {
                pin_hash: config.pin_hash.take(),
                ..Default::default()
            };
            Ok(())
        })
    }

    fn modify(&self, f: impl FnOnce(&mut AlarmConfiguration)) {
        let _ = self.try_modify(|config| {
            f(config);
            Ok::<(), Infallible>(())
        });
    }

    fn try_modify<E>(
        &self,
        f: impl FnOnce(&mut AlarmConfiguration) -> Result<(), E>,
    ) -> Result<(), E> {
        let _guard = self.write_lock.lock();

        let mut outcome = Ok(());
        let changed = self.state.send_if_modified(|config| {
            let before = config.clone();
            outcome = f(config);
            if outcome.is_err() {
                *config = before;
                return false;
            }
            *config != before
        });
        outcome?;

        if changed {
            let snapshot = self.state.borrow().clone();
            if let Err(e) = self.backend.save(&snapshot) {
                warn!(error = %e, "Failed to persist alarm record");
            }
        }
        Ok(())
    }
}
