//! The decision gate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::gate::engine::{DecisionEngine, DecisionError};

/// What the engine is asked to judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub operation: String,
    pub operation_id: String,
    /// Request fields relevant to the decision.
    pub fields: BTreeMap<String, Value>,
    /// Summary of what the external call produced.
    pub payload: Value,
}

/// The gate's answer. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed(String),
    Deny(String),
}

impl Decision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Proceed(reason) | Self::Deny(reason) => reason,
        }
    }
}

/// Authorizes or denies the side-effecting stage based on an external verdict.
///
/// Purely advisory: the gate never performs the side effect.
#[derive(Clone)]
pub struct DecisionGate {
    engine: Arc<dyn DecisionEngine>,
    affirmative: Vec<String>,
}

impl std::fmt::Debug for DecisionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionGate")
            .field("affirmative", &self.affirmative)
            .finish()
    }
}

impl DecisionGate {
    /// Keywords are matched case-insensitively anywhere in the verdict.
    pub fn new<I, S>(engine: Arc<dyn DecisionEngine>, affirmative: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let affirmative = affirmative
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { engine, affirmative }
    }

    pub async fn decide(&self, context: &DecisionContext) -> Result<Decision, DecisionError> {
        let verdict = self.engine.process_decision(context).await?;
        let decision = self.classify(&verdict);
        tracing::info!(
            operation_id = %context.operation_id,
            verdict = %verdict,
            proceed = decision.is_proceed(),
            "Decision received"
        );
        Ok(decision)
    }

    pub fn classify(&self, verdict: &str) -> Decision {
        let lowered = verdict.to_lowercase();
        match self.affirmative.iter().find(|k| lowered.contains(k.as_str())) {
            Some(keyword) => Decision::Proceed(format!("verdict '{}' matched '{}'", verdict, keyword)),
            None => Decision::Deny(verdict.to_string()),
        }
    }
}
