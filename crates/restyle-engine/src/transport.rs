use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use restyle_contracts::errors::{OrchestrationError, Stage};
use restyle_contracts::payloads::truncate_text;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::{ApiKey, EngineConfig};

const API_KEY_HEADER: &str = "x-api-key";
const ERROR_TEXT_MAX_CHARS: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// The request never produced an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
    pub timed_out: bool,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Terminal `TransportError` for a pipeline stage. Only the poll loop
    /// tolerates transport failures, and it never calls this.
    pub fn into_error(self, stage: Stage) -> OrchestrationError {
        warn!(%stage, timed_out = self.timed_out, "provider call failed: {}", self.message);
        OrchestrationError::Transport {
            stage,
            message: self.message,
        }
    }
}

/// HTTP seam between the pipeline stages and the provider.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Authenticated JSON POST against a provider endpoint.
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportFailure>;

    /// Raw binary PUT to a pre-signed upload target. Sends no credential.
    async fn put_bytes(
        &self,
        url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<HttpReply, TransportFailure>;

    /// Authenticated GET against a provider endpoint.
    async fn get_json(&self, url: &str) -> Result<HttpReply, TransportFailure>;
}

pub struct ReqwestTransport {
    http: HttpClient,
    api_key: ApiKey,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(api_key: ApiKey, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.api_key.clone(), config.request_timeout)
    }

    async fn finish(
        &self,
        label: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<HttpReply, TransportFailure> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| self.failure(label, &err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| self.failure(label, &err))?;
        Ok(HttpReply { status, body })
    }

    fn failure(&self, label: &str, err: &reqwest::Error) -> TransportFailure {
        let text = error_chain_text(err, ERROR_TEXT_MAX_CHARS);
        TransportFailure {
            message: self.api_key.scrub(&format!("{label} failed: {text}")),
            timed_out: err.is_timeout(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportFailure> {
        let request = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(body);
        self.finish("POST", request).await
    }

    async fn put_bytes(
        &self,
        url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<HttpReply, TransportFailure> {
        let request = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        self.finish("PUT", request).await
    }

    async fn get_json(&self, url: &str) -> Result<HttpReply, TransportFailure> {
        let request = self
            .http
            .get(url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .header(CONTENT_TYPE, "application/json");
        self.finish("GET", request).await
    }
}

fn error_chain_text(err: &(dyn std::error::Error + 'static), max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = cause {
        let text = current.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty()
            && !parts
                .last()
                .map(|existing| existing == trimmed)
                .unwrap_or(false)
        {
            parts.push(trimmed.to_string());
        }
        cause = current.source();
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}
