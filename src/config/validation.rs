//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts > 0, multiplier >= 1, delays ordered)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BackoffStrategy, PipelineConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.registry.address.trim().is_empty() {
        errors.push(ValidationError::new("registry.address", "must not be empty"));
    } else if url::Url::parse(&format!("http://{}/", config.registry.address)).is_err() {
        errors.push(ValidationError::new("registry.address", "must be a host[:port]"));
    }
    if config.registry.request_timeout_secs == 0 {
        errors.push(ValidationError::new("registry.request_timeout_secs", "must be > 0"));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be > 0"));
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be within 0.0..=1.0"));
    }
    if retries.backoff == BackoffStrategy::Exponential {
        if !retries.multiplier.is_finite() || retries.multiplier < 1.0 {
            errors.push(ValidationError::new("retries.multiplier", "must be >= 1.0"));
        }
        if retries.base_delay_ms > retries.max_delay_ms {
            errors.push(ValidationError::new("retries.base_delay_ms", "must not exceed max_delay_ms"));
        }
    }

    if config.decision.affirmative_keywords.iter().all(|k| k.trim().is_empty()) {
        errors.push(ValidationError::new("decision.affirmative_keywords", "at least one keyword required"));
    }
    if let Some(endpoint) = &config.decision.endpoint {
        if url::Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new("decision.endpoint", "must be an absolute URL"));
        }
    }

    if config.workers.concurrency == 0 {
        errors.push(ValidationError::new("workers.concurrency", "must be > 0"));
    }

    if url::Url::parse(&config.blockchain.rpc_url).is_err() {
        errors.push(ValidationError::new("blockchain.rpc_url", "must be an absolute URL"));
    }
    if config.blockchain.gas_price_multiplier <= 0.0 {
        errors.push(ValidationError::new("blockchain.gas_price_multiplier", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
