//! Service registry HTTP client.
//!
//! # Responsibilities
//! - Register a service definition with the registry agent
//! - Classify each attempt as success, transient or fatal
//! - Confirm a registered service is visible

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::RegistryConfig;
use crate::resilience::retries::AttemptResult;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry address '{0}'")]
    InvalidAddress(String),
    #[error("registry client error: {0}")]
    Client(String),
    #[error("registry request failed: {0}")]
    Transport(String),
    #[error("registry returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for the registry agent API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    base: url::Url,
}

impl RegistryClient {
    /// `address` is `host[:port]`.
    pub fn new(address: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let base = url::Url::parse(&format!("http://{}/", address.trim()))
            .map_err(|_| RegistryError::InvalidAddress(address.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Self::new(&config.address, Duration::from_secs(config.request_timeout_secs))
    }

    pub fn base_url(&self) -> &url::Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<url::Url, RegistryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidAddress(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// One registration attempt.
    ///
    /// Connection errors, timeouts, 429 and 5xx are transient; any other
    /// non-success status is a permanent rejection.
    pub async fn register(&self, definition: &Value) -> AttemptResult<()> {
        let url = match self.endpoint(&["v1", "agent", "service", "register"]) {
            Ok(url) => url,
            Err(e) => return AttemptResult::FatalFailure(e.to_string()),
        };

        let response = match self.client.put(url).json(definition).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return AttemptResult::FatalFailure(e.to_string()),
            Err(e) => return AttemptResult::TransientFailure(format!("registry unreachable: {}", e)),
        };

        let status = response.status();
        if status.is_success() {
            return AttemptResult::Success(());
        }

        let body = response.text().await.unwrap_or_default();
        classify_status(status, body.trim())
    }

    /// Whether the registry lists `service_id` as registered.
    pub async fn service_registered(&self, service_id: &str) -> Result<bool, RegistryError> {
        let url = self.endpoint(&["v1", "agent", "service", service_id])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(RegistryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Map a non-success registry status to an attempt result.
pub fn classify_status<T>(status: StatusCode, body: &str) -> AttemptResult<T> {
    let cause = format!("registry returned {}: {}", status.as_u16(), body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AttemptResult::TransientFailure(cause)
    } else {
        AttemptResult::FatalFailure(cause)
    }
}
