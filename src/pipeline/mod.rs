//! Gated operation pipeline.
//!
//! # Data Flow
//! ```text
//! OperationRequest
//!     → validation (schema of the operation)        ─ invalid → InputError
//!     → ResourceScope::acquire                      ─ failure → Transient/Fatal
//!         → RetryExecutor(operation.attempt)        ─ exhausted/fatal/cancelled
//!         → DecisionGate (when configured)          ─ Deny → Denied
//!         → operation.execute                       ─ failure → FatalError
//!     → ResourceScope::release (every path)
//!     → AuditSink::record (exactly once)
//!     → PipelineReport
//! ```
//!
//! # Design Decisions
//! - Each stage returns an explicit result; no stage throws past the runner
//! - Concrete operations plug in through [`GatedOperation`]
//! - Independent requests run concurrently on a bounded worker stream

pub mod operation;
pub mod runner;
pub mod state;

pub use operation::{EffectError, EffectReport, GatedOperation, OperationError};
pub use runner::{Pipeline, PipelineReport};
pub use state::{PipelineState, StateTrace};
