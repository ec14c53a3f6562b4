//! Audit record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Classification of a pipeline run's terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    Success,
    Denied,
    InputError,
    TransientError,
    FatalError,
    Cancelled,
}

impl OutcomeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::InputError => "input_error",
            Self::TransientError => "transient_error",
            Self::FatalError => "fatal_error",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for OutcomeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable entry describing one run's terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: Uuid,
    /// Operation type, also the ledger category.
    pub operation: String,
    pub operation_id: String,
    pub outcome: OutcomeClass,
    pub timestamp: DateTime<Utc>,
    /// Opaque detail blob.
    pub detail: Value,
}

impl AuditRecord {
    pub fn new(operation: &str, operation_id: &str, outcome: OutcomeClass, detail: Value) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            operation: operation.to_string(),
            operation_id: operation_id.to_string(),
            outcome,
            timestamp: Utc::now(),
            detail,
        }
    }
}
