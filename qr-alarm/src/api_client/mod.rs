//! HTTP client for the daemon API, used by `qr-alarm-cli`.

pub mod types;

use anyhow::{Result, bail};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use types::{
    AlarmPatchRequest, AlarmView, EnrollRequest, ErrorBody, ScanRequest, ScanResponse,
    ScheduleRequest, ScheduleResponse, SessionView, StopResponse,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7790";

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_alarm(&self) -> Result<AlarmView> {
        self.json(self.request(Method::GET, "/alarm")).await
    }

    pub async fn set_sound(&self, path: &str) -> Result<AlarmView> {
        let body = AlarmPatchRequest {
            audio_source: Some(path.to_string()),
        };
        self.json(self.request(Method::PATCH, "/alarm").json(&body))
            .await
    }

    pub async fn schedule(&self, request: &ScheduleRequest) -> Result<ScheduleResponse> {
        self.json(self.request(Method::PUT, "/alarm/schedule").json(request))
            .await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.empty(self.request(Method::DELETE, "/alarm/schedule"))
            .await
    }

    pub async fn enroll(&self, payload: &str) -> Result<()> {
        let body = EnrollRequest {
            payload: payload.to_string(),
        };
        self.empty(self.request(Method::POST, "/alarm/enroll").json(&body))
            .await
    }

    pub async fn get_session(&self) -> Result<SessionView> {
        self.json(self.request(Method::GET, "/session")).await
    }

    pub async fn stop(&self) -> Result<StopResponse> {
        self.json(self.request(Method::POST, "/session/stop")).await
    }

    pub async fn scan(&self, payload: &str) -> Result<ScanResponse> {
        let body = ScanRequest {
            payload: payload.to_string(),
        };
        self.json(self.request(Method::POST, "/session/scan").json(&body))
            .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api/v0{path}", self.base_url))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = checked(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn empty(&self, request: RequestBuilder) -> Result<()> {
        checked(request.send().await?).await?;
        Ok(())
    }
}

/// Turn an error status into an error carrying the server's reason.
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => bail!("{status}: {}", body.error),
        Err(_) => bail!("{status}"),
    }
}

