//! Pipeline orchestration.
//!
//! # Responsibilities
//! - Validate, then acquire the operation's resource inside a scope
//! - Drive the retryable external call, the gate, and the side effect
//! - Map every exit path, panics included, to exactly one audit record
//!
//! # Design Decisions
//! - The pipeline holds no per-run mutable state; one instance serves many
//!   concurrent runs
//! - A side-effect failure after the action took effect is audited with
//!   `partial_effect: true` and not compensated

use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::record::OutcomeClass;
use crate::audit::sink::{AuditSink, AuditStatus};
use crate::gate::decision::{Decision, DecisionGate};
use crate::lifecycle::scope::{with_scope, ScopeError};
use crate::lifecycle::shutdown::CancelToken;
use crate::observability::metrics;
use crate::pipeline::operation::{GatedOperation, OperationError};
use crate::pipeline::state::{PipelineState, StateTrace};
use crate::resilience::retries::{RetryExecutor, RetryOutcome};
use crate::validation::request::OperationRequest;
use crate::validation::validator::{InputValidator, ValidatedRequest};

/// Result of one pipeline run, returned after its audit record was written.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub operation: String,
    pub operation_id: String,
    pub outcome: OutcomeClass,
    /// External calls made.
    pub attempts: u32,
    /// Same blob that went into the audit record.
    pub detail: Value,
    pub trace: Vec<PipelineState>,
    pub audit: AuditStatus,
}

/// Terminal classification before auditing.
struct StageResult {
    outcome: OutcomeClass,
    attempts: u32,
    detail: Value,
}

impl StageResult {
    fn new(outcome: OutcomeClass, attempts: u32, detail: Value) -> Self {
        Self {
            outcome,
            attempts,
            detail,
        }
    }

    fn fatal(stage: &str, cause: impl Into<String>, attempts: u32) -> Self {
        Self::new(
            OutcomeClass::FatalError,
            attempts,
            json!({ "stage": stage, "cause": cause.into(), "partial_effect": false, "attempts": attempts }),
        )
    }
}

/// Validate → attempt (with retry) → decide → execute → audit.
pub struct Pipeline<O: GatedOperation> {
    operation: O,
    validator: InputValidator,
    retry: RetryExecutor,
    gate: Option<DecisionGate>,
    audit: AuditSink,
}

impl<O: GatedOperation> Pipeline<O> {
    pub fn new(operation: O, retry: RetryExecutor, audit: AuditSink) -> Self {
        let validator = InputValidator::new(operation.schema());
        Self {
            operation,
            validator,
            retry,
            gate: None,
            audit,
        }
    }

    /// Require a `Proceed` decision before the side effect.
    pub fn with_gate(mut self, gate: DecisionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    /// Process one request to a terminal, audited outcome.
    pub async fn run(&self, request: &OperationRequest, cancel: &CancelToken) -> PipelineReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "pipeline",
            operation = %self.operation.name(),
            operation_id = %request.id,
            run_id = %run_id
        );
        self.run_traced(run_id, request, cancel).instrument(span).await
    }

    /// Process independent requests with up to `concurrency` workers.
    ///
    /// Reports arrive in completion order. One request's failure never
    /// affects the others.
    pub async fn run_all(
        &self,
        requests: &[OperationRequest],
        concurrency: usize,
        cancel: &CancelToken,
    ) -> Vec<PipelineReport> {
        stream::iter(requests)
            .map(|request| self.run(request, cancel))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    async fn run_traced(&self, run_id: Uuid, request: &OperationRequest, cancel: &CancelToken) -> PipelineReport {
        let mut trace = StateTrace::new();

        let result = match self.validator.validate(request) {
            Ok(validated) => {
                trace.advance(PipelineState::Attempting);
                self.run_scoped(validated, cancel, &mut trace).await
            }
            Err(e) => {
                tracing::warn!(missing = ?e.missing, invalid = ?e.invalid, "Request rejected");
                StageResult::new(
                    OutcomeClass::InputError,
                    0,
                    json!({ "missing": e.missing, "invalid": e.invalid }),
                )
            }
        };

        trace.advance(PipelineState::Auditing);
        let name = self.operation.name();
        let audit = self
            .audit
            .record(name, result.outcome, &request.id, result.detail.clone())
            .await;
        trace.advance(PipelineState::Terminal(result.outcome));

        metrics::record_run(name, result.outcome.as_str());
        match result.outcome {
            OutcomeClass::Success => tracing::info!(attempts = result.attempts, "Operation succeeded"),
            OutcomeClass::FatalError => {
                tracing::error!(attempts = result.attempts, detail = %result.detail, "Operation failed")
            }
            other => tracing::warn!(outcome = %other, attempts = result.attempts, "Operation did not complete"),
        }

        PipelineReport {
            run_id,
            operation: name.to_string(),
            operation_id: request.id.clone(),
            outcome: result.outcome,
            attempts: result.attempts,
            detail: result.detail,
            trace: trace.states().to_vec(),
            audit,
        }
    }

    async fn run_scoped(
        &self,
        request: ValidatedRequest<'_>,
        cancel: &CancelToken,
        trace: &mut StateTrace,
    ) -> StageResult {
        // outlives the scope so a panic still reports the calls already made
        let attempts_made = AtomicU32::new(0);
        let counter = &attempts_made;
        let body_trace = &mut *trace;
        let scoped = with_scope(
            || self.operation.acquire(),
            |resource| self.operation.release(resource),
            |resource| async move { self.drive(&resource, &request, cancel, body_trace, counter).await },
        )
        .await;

        match scoped {
            Ok(result) => result,
            Err(ScopeError::Acquire(OperationError::Transient(cause))) => {
                tracing::warn!(cause = %cause, "Resource acquisition failed");
                StageResult::new(
                    OutcomeClass::TransientError,
                    0,
                    json!({ "stage": "acquire", "last_cause": cause, "attempts": 0 }),
                )
            }
            Err(ScopeError::Acquire(OperationError::Fatal(cause))) => {
                tracing::error!(cause = %cause, "Resource acquisition failed");
                StageResult::fatal("acquire", cause, 0)
            }
            Err(ScopeError::Panicked(message)) => {
                let stage = trace.current();
                let attempts = attempts_made.load(Ordering::SeqCst);
                tracing::error!(panic = %message, stage = ?stage, attempts, "Unexpected panic inside pipeline");
                StageResult::new(
                    OutcomeClass::FatalError,
                    attempts,
                    json!({
                        "stage": stage.stage_name(),
                        "cause": format!("panic: {}", message),
                        "partial_effect": stage == PipelineState::Executing,
                        "attempts": attempts
                    }),
                )
            }
        }
    }

    async fn drive(
        &self,
        resource: &O::Resource,
        request: &ValidatedRequest<'_>,
        cancel: &CancelToken,
        trace: &mut StateTrace,
        attempts_made: &AtomicU32,
    ) -> StageResult {
        let name = self.operation.name();
        let operation = &self.operation;

        let outcome = self
            .retry
            .execute(
                move |attempt| {
                    attempts_made.store(attempt, Ordering::SeqCst);
                    metrics::record_attempt(name);
                    tracing::debug!(attempt, "Attempting external call");
                    operation.attempt(resource, request)
                },
                cancel,
            )
            .await;

        let (payload, attempts) = match outcome {
            RetryOutcome::Succeeded { value, attempts } => (value, attempts),
            RetryOutcome::ExhaustedRetries { last_cause, attempts } => {
                return StageResult::new(
                    OutcomeClass::TransientError,
                    attempts,
                    json!({ "stage": "attempting", "last_cause": last_cause, "attempts": attempts }),
                );
            }
            RetryOutcome::Failed { cause, attempts } => return StageResult::fatal("attempting", cause, attempts),
            RetryOutcome::Cancelled { attempts } => {
                return StageResult::new(
                    OutcomeClass::Cancelled,
                    attempts,
                    json!({ "stage": "attempting", "attempts": attempts }),
                );
            }
        };

        if let Some(gate) = &self.gate {
            trace.advance(PipelineState::Deciding);
            let context = operation.decision_context(request, &payload);
            match gate.decide(&context).await {
                Ok(Decision::Proceed(reason)) => {
                    tracing::debug!(reason = %reason, "Gate allowed side effect");
                }
                Ok(Decision::Deny(reason)) => {
                    return StageResult::new(
                        OutcomeClass::Denied,
                        attempts,
                        json!({ "reason": reason, "attempts": attempts }),
                    );
                }
                Err(e) => return StageResult::fatal("deciding", e.to_string(), attempts),
            }
        }

        trace.advance(PipelineState::Executing);
        match operation.execute(resource, request, payload).await {
            Ok(report) => StageResult::new(
                OutcomeClass::Success,
                attempts,
                json!({ "attempts": attempts, "effect": report.detail }),
            ),
            Err(e) => {
                if e.partial {
                    tracing::error!(
                        cause = %e.cause,
                        "Side effect failed after taking effect; external state may be inconsistent"
                    );
                }
                StageResult::new(
                    OutcomeClass::FatalError,
                    attempts,
                    json!({
                        "stage": "executing",
                        "cause": e.cause,
                        "partial_effect": e.partial,
                        "attempts": attempts
                    }),
                )
            }
        }
    }
}
