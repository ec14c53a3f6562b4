//! The seam between the pipeline and a concrete operation.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::gate::decision::DecisionContext;
use crate::resilience::retries::AttemptResult;
use crate::validation::validator::{RequestSchema, ValidatedRequest};

/// Failure to acquire or release an operation's resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Failure of the side-effecting stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("side effect failed: {cause}")]
pub struct EffectError {
    pub cause: String,
    /// The action took effect before the failure (e.g. a post-action
    /// health check failed after the transaction was broadcast).
    pub partial: bool,
}

impl EffectError {
    /// Nothing was applied.
    pub fn before_effect(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            partial: false,
        }
    }

    /// The action already took effect.
    pub fn after_effect(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            partial: true,
        }
    }
}

/// What a completed side effect produced; stored in the audit detail.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectReport {
    pub detail: Value,
}

impl EffectReport {
    pub fn new(detail: Value) -> Self {
        Self { detail }
    }
}

/// An operation the pipeline can drive.
///
/// `acquire`/`release` bracket one run; `attempt` is the retryable external
/// call; `execute` performs the side effect after the gate allowed it.
#[async_trait]
pub trait GatedOperation: Send + Sync {
    /// Handle to the acquired resource. Cloned into the scope body.
    type Resource: Clone + Send + Sync;
    /// What a successful attempt yields.
    type Payload: Send + Sync;

    /// Operation type; also the audit category.
    fn name(&self) -> &str;

    fn schema(&self) -> RequestSchema;

    async fn acquire(&self) -> Result<Self::Resource, OperationError>;

    async fn release(&self, resource: Self::Resource) -> Result<(), OperationError>;

    async fn attempt(
        &self,
        resource: &Self::Resource,
        request: &ValidatedRequest<'_>,
    ) -> AttemptResult<Self::Payload>;

    fn decision_context(&self, request: &ValidatedRequest<'_>, payload: &Self::Payload) -> DecisionContext;

    async fn execute(
        &self,
        resource: &Self::Resource,
        request: &ValidatedRequest<'_>,
        payload: Self::Payload,
    ) -> Result<EffectReport, EffectError>;
}
