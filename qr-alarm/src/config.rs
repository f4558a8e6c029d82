//! Daemon settings.
//!
//! Defaults are usable as-is; each field can be overridden through a
//! `QRALARM_*` environment variable.

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default auto-stop ceiling: ringing ends on its own after 25 minutes.
pub const DEFAULT_AUTO_STOP: Duration = Duration::from_secs(25 * 60);

/// Longest accepted auto-stop ceiling.
pub const MAX_AUTO_STOP: Duration = Duration::from_secs(24 * 60 * 60);

/// Default period of the volume enforcer.
pub const DEFAULT_VOLUME_INTERVAL: Duration = Duration::from_millis(600);

/// Accepted range for the volume enforcer period.
pub const MIN_VOLUME_INTERVAL: Duration = Duration::from_millis(10);
pub const MAX_VOLUME_INTERVAL: Duration = Duration::from_secs(60);

pub const DEFAULT_API_PORT: u16 = 7790;

#[derive(Debug, Clone, PartialEq)]
pub struct RingingConfig {
    /// Ringing stops by itself this long after it started, whether or
    /// not the code was ever scanned.
    pub auto_stop_after: Duration,

    /// How often the alarm channel is forced back to full volume.
    pub volume_interval: Duration,
}

impl Default for RingingConfig {
    fn default() -> Self {
        Self {
            auto_stop_after: DEFAULT_AUTO_STOP,
            volume_interval: DEFAULT_VOLUME_INTERVAL,
        }
    }
}

impl RingingConfig {
    /// Both periods pulled into the accepted ranges.
    pub fn bounded(&self) -> Self {
        Self {
            auto_stop_after: self.auto_stop_after.min(MAX_AUTO_STOP),
            volume_interval: self
                .volume_interval
                .clamp(MIN_VOLUME_INTERVAL, MAX_VOLUME_INTERVAL),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub api_addr: SocketAddr,

    /// Where the alarm record lives. `None` keeps it in memory only.
    pub state_path: Option<PathBuf>,

    /// Sound played when the configured one is absent or fails to open.
    pub default_sound: Option<PathBuf>,

    pub ringing: RingingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_API_PORT)),
            state_path: default_state_path(),
            default_sound: None,
            ringing: RingingConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `QRALARM_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("QRALARM_API_ADDR") {
            config.api_addr = addr
                .parse()
                .map_err(|_| invalid("QRALARM_API_ADDR", &addr))?;
        }
        if let Some(path) = lookup("QRALARM_STATE_PATH") {
            config.state_path = Some(PathBuf::from(path));
        }
        if lookup("QRALARM_EPHEMERAL").is_some_and(|v| v != "0") {
            config.state_path = None;
        }
        if let Some(path) = lookup("QRALARM_DEFAULT_SOUND") {
            config.default_sound = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup("QRALARM_AUTO_STOP_SECS") {
            config.ringing.auto_stop_after =
                parse_duration(&secs, Duration::from_secs, Duration::from_secs(1)..=MAX_AUTO_STOP)
                    .ok_or_else(|| invalid("QRALARM_AUTO_STOP_SECS", &secs))?;
        }
        if let Some(ms) = lookup("QRALARM_VOLUME_INTERVAL_MS") {
            config.ringing.volume_interval = parse_duration(
                &ms,
                Duration::from_millis,
                MIN_VOLUME_INTERVAL..=MAX_VOLUME_INTERVAL,
            )
            .ok_or_else(|| invalid("QRALARM_VOLUME_INTERVAL_MS", &ms))?;
        }

        Ok(config)
    }
}

/// `<data dir>/alarm.json`, e.g. `~/.local/share/qr-alarm/alarm.json`.
fn default_state_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "qr-alarm")
        .map(|dirs| dirs.data_dir().join("alarm.json"))
}

fn parse_duration(
    value: &str,
    unit: fn(u64) -> Duration,
    range: RangeInclusive<Duration>,
) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(unit)
        .filter(|d| range.contains(d))
}

fn invalid(key: &str, value: &str) -> Error {
    Error::Settings(format!("{key}: invalid value {value:?}"))
}
