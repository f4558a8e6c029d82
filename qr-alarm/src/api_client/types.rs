//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients. Digests never appear here; only whether one is set.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::platform::Indication;
use crate::session::{ScanSubmit, StopReason};

/// The alarm record as shown to users.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct AlarmView {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trigger_time: Option<OffsetDateTime>,
    pub audio_source: Option<String>,
    pub enabled: bool,
    /// Ringing right now.
    pub active: bool,
    pub secret_enrolled: bool,
    pub pin_set: bool,
    /// The wake-up actually pending with the timer.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_wake: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct AlarmPatchRequest {
    /// Sound to play, as a path on the daemon's machine.
    pub audio_source: Option<String>,
}

/// Exactly one of `at` and `time_of_day` must be given.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ScheduleRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub at: Option<OffsetDateTime>,
    /// Local time of day, `HH:MM`.
    pub time_of_day: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ScheduleResponse {
    #[serde(with = "time::serde::rfc3339")]
    pub trigger_time: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct EnrollRequest {
    /// Decoded QR payload.
    pub payload: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct SessionView {
    pub ringing: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub since: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub auto_stop_at: Option<OffsetDateTime>,
    pub indication: Option<Indication>,
    pub last_stop: Option<StopReason>,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct StopResponse {
    /// False if nothing was ringing.
    pub stopped: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ScanRequest {
    pub payload: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ScanResponse {
    pub result: ScanSubmit,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct SetPinRequest {
    pub pin: String,
    /// Required when a PIN is already set.
    pub current: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct PinRequest {
    pub pin: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct PinVerifyResponse {
    pub valid: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
