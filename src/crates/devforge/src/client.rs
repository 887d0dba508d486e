//! HTTP client for the DevForge service

use crate::error::{CliError, Result};
use devforge_core::{ActionRequest, ResponseEnvelope};
use devforge_server::api::models::{HealthResponse, LogsResponse, SystemInfoResponse};
use devforge_server::api::CALLER_HEADER;
use devforge_server::LogEntry;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Timeout for `/health` probes
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ServiceClient {
    base_url: String,
    caller: String,
    http: reqwest::Client,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            caller: default_caller(),
            http,
        })
    }

    /// Identity sent in the caller header
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether the service answers `/health`
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        if !response.status().is_success() {
            return Err(CliError::Protocol(format!("/health returned {}", response.status())));
        }
        Ok(response.json().await?)
    }

    pub async fn dispatch(&self, request: &ActionRequest) -> Result<ResponseEnvelope> {
        let response = self
            .http
            .post(self.url("/api/v1/actions"))
            .header(CALLER_HEADER, &self.caller)
            .json(request)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        read_envelope(response).await
    }

    pub async fn select(&self, session_id: &str, index: usize) -> Result<ResponseEnvelope> {
        let response = self
            .http
            .post(self.url(&format!("/api/v1/sessions/{}/select", session_id)))
            .header(CALLER_HEADER, &self.caller)
            .json(&json!({ "index": index }))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        read_envelope(response).await
    }

    pub async fn cancel(&self, session_id: &str) -> Result<ResponseEnvelope> {
        let response = self
            .http
            .delete(self.url(&format!("/api/v1/sessions/{}", session_id)))
            .header(CALLER_HEADER, &self.caller)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        read_envelope(response).await
    }

    /// Last `lines` service log entries, optionally only those after `since`
    pub async fn logs(&self, lines: usize, since: Option<u64>) -> Result<Vec<LogEntry>> {
        let mut request = self.http.get(self.url("/api/v1/logs")).query(&[("lines", lines)]);
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }
        let response = request.send().await.map_err(|e| self.unavailable(e))?;
        let body: LogsResponse = read_data(response).await?;
        Ok(body.entries)
    }

    pub async fn system_info(&self) -> Result<SystemInfoResponse> {
        let response = self
            .http
            .get(self.url("/api/v1/system/info"))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        read_data(response).await
    }

    fn unavailable(&self, err: reqwest::Error) -> CliError {
        if err.is_connect() || err.is_timeout() {
            CliError::ServiceUnavailable {
                url: self.base_url.clone(),
                reason: err.to_string(),
            }
        } else {
            CliError::Http(err)
        }
    }
}

/// Action and session routes answer with an envelope even on 4xx
async fn read_envelope(response: reqwest::Response) -> Result<ResponseEnvelope> {
    let status = response.status();
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|_| CliError::Protocol(format!("HTTP {}: {}", status, text.trim())))
}

/// Payload of a success envelope
async fn read_data<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let envelope = read_envelope(response).await?;
    if !envelope.is_success() {
        return Err(CliError::Protocol(envelope.message));
    }
    let data = envelope
        .data
        .ok_or_else(|| CliError::Protocol("response carried no data".to_string()))?;
    serde_json::from_value(data).map_err(|e| CliError::Protocol(e.to_string()))
}

/// `user@host`, or `devforge-cli` when neither is known
pub fn default_caller() -> String {
    let user = std::env::var("USER").or_else(|_| std::env::var("USERNAME")).ok();
    let host = std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME")).ok();
    match (user, host) {
        (Some(user), Some(host)) => format!("{}@{}", user, host),
        (Some(user), None) => user,
        _ => "devforge-cli".to_string(),
    }
}
