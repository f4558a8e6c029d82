use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::secret::SecretDigest;

/// Opaque reference to the sound played while ringing.
///
/// The platform audio backend decides how to resolve it; the desktop
/// backends treat it as a file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioSource(String);

impl AudioSource {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single alarm record.
///
/// This is the only durable state in the system. Every component reads
/// and writes it through [`ConfigStore`](super::ConfigStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfiguration {
    /// Next wake time; `None` means unscheduled.
    #[serde(with = "time::serde::rfc3339::option")]
    pub trigger_time: Option<OffsetDateTime>,

    /// Sound to play; `None` plays the platform default.
    pub audio_source: Option<AudioSource>,

    /// Digest of the enrolled QR payload.
    pub dismissal_secret_hash: Option<SecretDigest>,

    /// The user wants the alarm to fire.
    pub enabled: bool,

    /// The alarm is ringing right now.
    pub active: bool,

    /// Digest of the uninstall-guard PIN.
    pub pin_hash: Option<SecretDigest>,
}

/// A piece of configuration the alarm cannot do without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    TriggerTime,
    AudioSource,
    DismissalSecret,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Missing::TriggerTime => "trigger time",
            Missing::AudioSource => "audio source",
            Missing::DismissalSecret => "dismissal code",
        })
    }
}

impl AlarmConfiguration {
    pub fn has_secret(&self) -> bool {
        self.dismissal_secret_hash
            .as_ref()
            .is_some_and(|digest| !digest.is_empty())
    }

    /// Check what `schedule()` needs: a sound and an enrolled code.
    pub fn check_schedulable(&self) -> Result<(), Missing> {
        if self.audio_source.is_none() {
            return Err(Missing::AudioSource);
        }
        if !self.has_secret() {
            return Err(Missing::DismissalSecret);
        }
        Ok(())
    }

    /// Check what a ringing session needs. The sound is optional here
    /// because ringing falls back to the platform default.
    pub fn check_ringable(&self) -> Result<(), Missing> {
        if self.trigger_time.is_none() {
            return Err(Missing::TriggerTime);
        }
        if !self.has_secret() {
            return Err(Missing::DismissalSecret);
        }
        Ok(())
    }
}

/// Partial update merged into the record by
/// [`ConfigStore::update`](super::ConfigStore::update).
///
/// `None` fields are left untouched; an update never clears a field it does
/// not name. Clearing goes through the narrow setters on the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub trigger_time: Option<OffsetDateTime>,
    pub audio_source: Option<AudioSource>,
    pub enabled: Option<bool>,
}

impl ConfigUpdate {
    /// Whether the update writes a field that is frozen while ringing.
    pub(crate) fn touches_locked_fields(&self) -> bool {
        self.trigger_time.is_some() || self.audio_source.is_some()
    }

    pub(crate) fn apply_to(self, config: &mut AlarmConfiguration) {
        if let Some(trigger_time) = self.trigger_time {
            config.trigger_time = Some(trigger_time);
        }
        if let Some(audio_source) = self.audio_source {
            config.audio_source = Some(audio_source);
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn complete() -> AlarmConfiguration {
        AlarmConfiguration {
            trigger_time: Some(datetime!(2026-10-17 07:30 +2)),
            audio_source: Some(AudioSource::new("/sounds/rooster.ogg")),
            dismissal_secret_hash: Some(SecretDigest::of("XYZ123")),
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn merge_keeps_unspecified_fields() {
        let mut config = complete();
        let update = ConfigUpdate {
            audio_source: Some(AudioSource::new("/sounds/bell.ogg")),
            ..Default::default()
        };
        update.apply_to(&mut config);

        assert_eq!(config.audio_source, Some(AudioSource::new("/sounds/bell.ogg")));
        assert_eq!(config.trigger_time, complete().trigger_time);
        assert_eq!(config.dismissal_secret_hash, complete().dismissal_secret_hash);
        assert!(config.enabled);
    }

    #[test]
    fn empty_update_is_identity() {
        let mut config = complete();
        ConfigUpdate::default().apply_to(&mut config);
        assert_eq!(config, complete());
    }

    #[test]
    fn schedulable_needs_sound_and_code() {
        assert_eq!(complete().check_schedulable(), Ok(()));

        let mut config = complete();
        config.audio_source = None;
        assert_eq!(config.check_schedulable(), Err(Missing::AudioSource));

        let mut config = complete();
        config.dismissal_secret_hash = None;
        assert_eq!(config.check_schedulable(), Err(Missing::DismissalSecret));
    }

    #[test]
    fn ringable_tolerates_missing_sound() {
        let mut config = complete();
        config.audio_source = None;
        assert_eq!(config.check_ringable(), Ok(()));

        config.trigger_time = None;
        assert_eq!(config.check_ringable(), Err(Missing::TriggerTime));
    }

    #[test]
    fn record_survives_json() {
        let json = serde_json::to_string(&complete()).unwrap();
        assert!(json.contains("\"trigger_time\":\"2026-10-17T07:30:00+02:00\""));
        let back: AlarmConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, complete());
    }

    #[test]
    fn missing_fields_default() {
        let config: AlarmConfiguration = serde_json::from_str(r#"{"enabled":true}"#).unwrap();
        assert!(config.enabled);
        assert!(!config.active);
        assert_eq!(config.trigger_time, None);
    }
}
