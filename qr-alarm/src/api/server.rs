//! HTTP server wiring: shared state, router, error mapping.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::{Json, Router, http::StatusCode, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use super::v0;
use crate::api_client::types::{AlarmView, ErrorBody, SessionView};
use crate::error::Result;
use crate::scheduler::{ScheduleError, Scheduler};
use crate::session::{SessionHandle, SessionState};
use crate::store::{ConfigError, ConfigStore};
use crate::tracing::prelude::*;

#[derive(OpenApi)]
#[openapi(info(
    title = "qr-alarm",
    description = "Wake-up alarm dismissed by scanning an enrolled QR code"
))]
struct ApiDoc;

/// State shared by all handlers.
#[derive(Clone)]
pub struct SharedState {
    pub store: Arc<ConfigStore>,
    pub scheduler: Arc<Scheduler>,
    pub session: SessionHandle,
}

impl SharedState {
    pub fn alarm_view(&self) -> AlarmView {
        let config = self.store.read();
        AlarmView {
            secret_enrolled: config.has_secret(),
            pin_set: config.pin_hash.is_some(),
            trigger_time: config.trigger_time,
            audio_source: config.audio_source.map(|s| s.to_string()),
            enabled: config.enabled,
            active: config.active,
            next_wake: self.scheduler.next_trigger(),
        }
    }

    pub fn session_view(&self) -> SessionView {
        match self.session.state() {
            SessionState::Idle { last_stop } => SessionView {
                last_stop,
                ..Default::default()
            },
            SessionState::Ringing {
                since,
                auto_stop_at,
                indication,
            } => SessionView {
                ringing: true,
                since: Some(since),
                auto_stop_at: Some(auto_stop_at),
                indication,
                last_stop: None,
            },
        }
    }
}

/// Error response: a status code and a one-line reason.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        let status = match e {
            ConfigError::AlarmActive => StatusCode::CONFLICT,
            ConfigError::EmptySecret | ConfigError::InvalidPin => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        let status = match e {
            ScheduleError::PermissionRequired => StatusCode::FORBIDDEN,
            ScheduleError::ConfigurationIncomplete(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScheduleError::AlarmActive => StatusCode::CONFLICT,
            ScheduleError::Timer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

/// Build the full router: `/api/v0/...` plus the OpenAPI document.
pub fn router(state: SharedState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v0", v0::routes())
        .split_for_parts();

    router
        .route(
            "/api/openapi.json",
            get(move || {
                let api = api.clone();
                async move { Json(api) }
            }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, state: SharedState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    debug!("API server stopped");
    Ok(())
}
