//! Audit subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline terminal state
//!     → sink.rs (build AuditRecord, exactly one per run)
//!     → ledger.rs primary (store_audit; log_transaction for successes)
//!     → on failure: dead-letter ledger
//!     → on failure again: full record logged at error level
//! ```
//!
//! # Design Decisions
//! - Append-only: records are never updated or deleted
//! - Recording never fails the pipeline and never rolls back a side effect
//! - The ledger category is the operation name

pub mod ledger;
pub mod record;
pub mod sink;

pub use ledger::{AuditLedger, JsonlLedger, LedgerError, MemoryLedger};
pub use record::{AuditRecord, OutcomeClass};
pub use sink::{AuditSink, AuditStatus};
