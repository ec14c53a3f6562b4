//! The audit sink: one durable record per pipeline run.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::audit::ledger::{AuditLedger, LedgerError};
use crate::audit::record::{AuditRecord, OutcomeClass};
use crate::observability::metrics;

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum AuditStatus {
    Recorded,
    /// Primary ledger failed; the record went to the dead-letter ledger.
    DeadLettered { error: String },
    /// Both ledgers failed; the record survives only in the process log.
    Lost { error: String },
}

/// Writes terminal outcomes to the ledger without ever failing the caller.
#[derive(Clone)]
pub struct AuditSink {
    primary: Arc<dyn AuditLedger>,
    dead_letter: Option<Arc<dyn AuditLedger>>,
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink")
            .field("dead_letter", &self.dead_letter.is_some())
            .finish()
    }
}

impl AuditSink {
    pub fn new(primary: Arc<dyn AuditLedger>) -> Self {
        Self {
            primary,
            dead_letter: None,
        }
    }

    pub fn with_dead_letter(mut self, ledger: Arc<dyn AuditLedger>) -> Self {
        self.dead_letter = Some(ledger);
        self
    }

    /// Append one record for a run of `operation`.
    ///
    /// Successful runs are also written to the transaction log.
    pub async fn record(
        &self,
        operation: &str,
        outcome: OutcomeClass,
        operation_id: &str,
        detail: Value,
    ) -> AuditStatus {
        let record = AuditRecord::new(operation, operation_id, outcome, detail);

        let error = match self.write_primary(operation, &record).await {
            Ok(()) => {
                tracing::debug!(
                    record_id = %record.record_id,
                    operation_id,
                    outcome = %outcome,
                    "Audit record stored"
                );
                return AuditStatus::Recorded;
            }
            Err(e) => e,
        };

        metrics::record_audit_failure(operation);
        tracing::error!(
            operation_id,
            outcome = %outcome,
            error = %error,
            "Audit write failed, escalating to dead letter"
        );

        let dead_letter = match &self.dead_letter {
            Some(ledger) => ledger.store_audit(operation, &record).await,
            None => Err(LedgerError::Unavailable("no dead-letter ledger configured".to_string())),
        };

        match dead_letter {
            Ok(()) => AuditStatus::DeadLettered {
                error: error.to_string(),
            },
            Err(dl_error) => {
                let json = serde_json::to_string(&record).unwrap_or_else(|_| format!("{:?}", record));
                tracing::error!(
                    operation_id,
                    error = %dl_error,
                    record = %json,
                    "Audit record lost"
                );
                AuditStatus::Lost {
                    error: format!("{}; dead letter: {}", error, dl_error),
                }
            }
        }
    }

    async fn write_primary(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError> {
        if record.outcome.is_success() {
            self.primary.log_transaction(category, record).await?;
        }
        self.primary.store_audit(category, record).await
    }
}
