//! Decision engine collaborators.
//!
//! The engine is opaque: it receives a context and answers with a verdict
//! string. Interpreting the verdict is the gate's job.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::DecisionConfig;
use crate::gate::decision::DecisionContext;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision engine not configured")]
    NotConfigured,
    #[error("decision engine request failed: {0}")]
    Transport(String),
    #[error("decision engine returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decision engine returned an empty verdict")]
    EmptyVerdict,
}

/// External, advisory decision function.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn process_decision(&self, context: &DecisionContext) -> Result<String, DecisionError>;
}

/// Always answers with the same verdict.
#[derive(Debug, Clone)]
pub struct StaticDecisionEngine {
    verdict: String,
}

impl StaticDecisionEngine {
    pub fn new(verdict: impl Into<String>) -> Self {
        Self {
            verdict: verdict.into(),
        }
    }
}

#[async_trait]
impl DecisionEngine for StaticDecisionEngine {
    async fn process_decision(&self, _context: &DecisionContext) -> Result<String, DecisionError> {
        Ok(self.verdict.clone())
    }
}

/// POSTs the context as JSON to an agent endpoint.
///
/// Accepts either a plain-text verdict or a JSON object with a `verdict`
/// or `classification` string.
#[derive(Debug, Clone)]
pub struct HttpDecisionEngine {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpDecisionEngine {
    pub fn new(endpoint: url::Url, timeout: Duration) -> Result<Self, DecisionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecisionError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &DecisionConfig) -> Result<Self, DecisionError> {
        let raw = config.endpoint.as_deref().ok_or(DecisionError::NotConfigured)?;
        let endpoint = url::Url::parse(raw).map_err(|e| DecisionError::Transport(format!("invalid endpoint: {}", e)))?;
        Self::new(endpoint, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl DecisionEngine for HttpDecisionEngine {
    async fn process_decision(&self, context: &DecisionContext) -> Result<String, DecisionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(context)
            .send()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(DecisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_verdict(&body).ok_or(DecisionError::EmptyVerdict)
    }
}

/// Pull the verdict out of an engine response body.
pub fn extract_verdict(body: &str) -> Option<String> {
    let verdict = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["verdict", "classification"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Ok(Value::String(s)) => Some(s),
        _ => Some(body.to_string()),
    }?;
    let trimmed = verdict.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_text() {
        assert_eq!(extract_verdict("Boost\n").as_deref(), Some("Boost"));
        assert_eq!(extract_verdict("   "), None);
    }

    #[test]
    fn test_extract_structured() {
        assert_eq!(extract_verdict(r#"{"verdict":"Reject","score":0.1}"#).as_deref(), Some("Reject"));
        assert_eq!(extract_verdict(r#"{"classification":"boost"}"#).as_deref(), Some("boost"));
        assert_eq!(extract_verdict(r#""Boost""#).as_deref(), Some("Boost"));
        assert_eq!(extract_verdict(r#"{"other":"x"}"#), None);
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = DecisionConfig::default();
        assert!(matches!(HttpDecisionEngine::from_config(&config), Err(DecisionError::NotConfigured)));
    }
}
