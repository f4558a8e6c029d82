//! API v0 endpoints.
//!
//! Version 0 signals an unstable API -- breaking changes are expected
//! until the daemon reaches 1.0.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use time::Time;
use time::macros::format_description;
use tokio_stream::{Stream, StreamExt, wrappers::WatchStream};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::{ApiError, SharedState};
use crate::api_client::types::{
    AlarmPatchRequest, AlarmView, EnrollRequest, PinRequest, PinVerifyResponse, ScanRequest,
    ScanResponse, ScheduleRequest, ScheduleResponse, SessionView, SetPinRequest, StopResponse,
};
use crate::store::{AudioSource, ConfigError, ConfigUpdate};

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_alarm, patch_alarm, delete_alarm))
        .routes(routes!(put_schedule, delete_schedule))
        .routes(routes!(enroll))
        .routes(routes!(alarm_events))
        .routes(routes!(get_session))
        .routes(routes!(stop_session))
        .routes(routes!(scan))
        .routes(routes!(put_pin, delete_pin))
        .routes(routes!(verify_pin))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Return the alarm record.
#[utoipa::path(
    get,
    path = "/alarm",
    tag = "alarm",
    responses(
        (status = OK, description = "Current alarm", body = AlarmView),
    ),
)]
async fn get_alarm(State(state): State<SharedState>) -> Json<AlarmView> {
    Json(state.alarm_view())
}

/// Change the alarm sound.
#[utoipa::path(
    patch,
    path = "/alarm",
    tag = "alarm",
    request_body = AlarmPatchRequest,
    responses(
        (status = OK, description = "Updated alarm", body = AlarmView),
        (status = CONFLICT, description = "Alarm is ringing"),
        (status = UNPROCESSABLE_ENTITY, description = "Empty audio source"),
    ),
)]
async fn patch_alarm(
    State(state): State<SharedState>,
    Json(req): Json<AlarmPatchRequest>,
) -> Result<Json<AlarmView>, ApiError> {
    if let Some(source) = req.audio_source {
        let source = source.trim();
        if source.is_empty() {
            return Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "audio source is empty",
            ));
        }
        state.store.update(ConfigUpdate {
            audio_source: Some(AudioSource::new(source)),
            ..Default::default()
        })?;
    }

    Ok(Json(state.alarm_view()))
}

/// Cancel the alarm and forget its sound and code. The PIN is kept.
#[utoipa::path(
    delete,
    path = "/alarm",
    tag = "alarm",
    responses(
        (status = NO_CONTENT, description = "Alarm cleared"),
        (status = CONFLICT, description = "Alarm is ringing"),
    ),
)]
async fn delete_alarm(State(state): State<SharedState>) -> Result<StatusCode, ApiError> {
    if state.store.read().active {
        return Err(ConfigError::AlarmActive.into());
    }
    state.scheduler.cancel();
    state.store.clear()?;
    Ok(StatusCode::NO_CONTENT)
}

/// Schedule the alarm.
///
/// A time that has already passed moves to its next occurrence.
#[utoipa::path(
    put,
    path = "/alarm/schedule",
    tag = "alarm",
    request_body = ScheduleRequest,
    responses(
        (status = OK, description = "Registered wake-up", body = ScheduleResponse),
        (status = FORBIDDEN, description = "Exact wake-ups not permitted"),
        (status = CONFLICT, description = "Alarm is ringing"),
        (status = UNPROCESSABLE_ENTITY, description = "Missing sound or code, or bad time"),
    ),
)]
async fn put_schedule(
    State(state): State<SharedState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let trigger_time = match (req.at, req.time_of_day) {
        (Some(at), None) => state.scheduler.schedule(at)?,
        (None, Some(time_of_day)) => {
            let time = parse_time_of_day(&time_of_day)?;
            state.scheduler.schedule_time_of_day(time)?
        }
        _ => {
            return Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "give exactly one of `at` and `time_of_day`",
            ));
        }
    };

    Ok(Json(ScheduleResponse { trigger_time }))
}

fn parse_time_of_day(value: &str) -> Result<Time, ApiError> {
    Time::parse(value.trim(), format_description!("[hour]:[minute]")).map_err(|_| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid time of day {value:?}, expected HH:MM"),
        )
    })
}

/// Cancel the pending wake-up.
#[utoipa::path(
    delete,
    path = "/alarm/schedule",
    tag = "alarm",
    responses(
        (status = NO_CONTENT, description = "Nothing scheduled any more"),
    ),
)]
async fn delete_schedule(State(state): State<SharedState>) -> StatusCode {
    state.scheduler.cancel();
    StatusCode::NO_CONTENT
}

/// Enroll the code that dismisses the alarm.
#[utoipa::path(
    post,
    path = "/alarm/enroll",
    tag = "alarm",
    request_body = EnrollRequest,
    responses(
        (status = NO_CONTENT, description = "Code enrolled"),
        (status = CONFLICT, description = "Alarm is ringing"),
        (status = UNPROCESSABLE_ENTITY, description = "Empty payload"),
    ),
)]
async fn enroll(
    State(state): State<SharedState>,
    Json(req): Json<EnrollRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.enroll(&req.payload)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream the alarm record: the current value, then every change.
#[utoipa::path(
    get,
    path = "/alarm/events",
    tag = "alarm",
    responses(
        (status = OK, description = "Server-sent `alarm` events", content_type = "text/event-stream", body = AlarmView),
    ),
)]
async fn alarm_events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let updates = WatchStream::new(state.store.subscribe());
    let events = updates.map(move |_| Event::default().event("alarm").json_data(state.alarm_view()));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Return the ringing session state.
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses(
        (status = OK, description = "Session state", body = SessionView),
    ),
)]
async fn get_session(State(state): State<SharedState>) -> Json<SessionView> {
    Json(state.session_view())
}

/// Stop ringing without a scan.
#[utoipa::path(
    post,
    path = "/session/stop",
    tag = "session",
    responses(
        (status = OK, description = "Whether anything was ringing", body = StopResponse),
    ),
)]
async fn stop_session(State(state): State<SharedState>) -> Json<StopResponse> {
    let stopped = state.session.stop().await;
    Json(StopResponse { stopped })
}

/// Submit a decoded QR payload while ringing.
///
/// The comparison happens asynchronously; watch `/session` for the result.
#[utoipa::path(
    post,
    path = "/session/scan",
    tag = "session",
    request_body = ScanRequest,
    responses(
        (status = OK, description = "What happened to the scan", body = ScanResponse),
    ),
)]
async fn scan(
    State(state): State<SharedState>,
    Json(req): Json<ScanRequest>,
) -> Json<ScanResponse> {
    let result = state.session.submit_scan(req.payload);
    Json(ScanResponse { result })
}

/// Set or change the PIN.
#[utoipa::path(
    put,
    path = "/pin",
    tag = "pin",
    request_body = SetPinRequest,
    responses(
        (status = NO_CONTENT, description = "PIN set"),
        (status = FORBIDDEN, description = "Current PIN missing or wrong"),
        (status = UNPROCESSABLE_ENTITY, description = "PIN is not 4 to 8 digits"),
    ),
)]
async fn put_pin(
    State(state): State<SharedState>,
    Json(req): Json<SetPinRequest>,
) -> Result<StatusCode, ApiError> {
    if state.store.read().pin_hash.is_some() {
        let authorized = req
            .current
            .as_deref()
            .is_some_and(|current| state.store.verify_pin(current));
        if !authorized {
            return Err(ApiError::new(StatusCode::FORBIDDEN, "current PIN required"));
        }
    }
    state.store.set_pin(&req.pin)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove the PIN.
#[utoipa::path(
    delete,
    path = "/pin",
    tag = "pin",
    request_body = PinRequest,
    responses(
        (status = NO_CONTENT, description = "No PIN set any more"),
        (status = FORBIDDEN, description = "Wrong PIN"),
    ),
)]
async fn delete_pin(
    State(state): State<SharedState>,
    Json(req): Json<PinRequest>,
) -> Result<StatusCode, ApiError> {
    if state.store.read().pin_hash.is_some() && !state.store.verify_pin(&req.pin) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "wrong PIN"));
    }
    state.store.clear_pin();
    Ok(StatusCode::NO_CONTENT)
}

/// Check a PIN without changing anything.
#[utoipa::path(
    post,
    path = "/pin/verify",
    tag = "pin",
    request_body = PinRequest,
    responses(
        (status = OK, description = "Whether the PIN matches", body = PinVerifyResponse),
    ),
)]
async fn verify_pin(
    State(state): State<SharedState>,
    Json(req): Json<PinRequest>,
) -> Json<PinVerifyResponse> {
    Json(PinVerifyResponse {
        valid: state.store.verify_pin(&req.pin),
    })
}
