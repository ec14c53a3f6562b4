//! Decision gate subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline (after a successful external call)
//!     → decision.rs (build DecisionContext, classify verdict)
//!     → engine.rs (external decision function: HTTP agent or static)
//!     → Proceed(reason) | Deny(verdict)
//! ```
//!
//! # Design Decisions
//! - Affirmative keywords come from config (default "boost")
//! - Anything that is not affirmative is a denial, never an error
//! - Engine unavailability is an error, surfaced to the pipeline as fatal

pub mod decision;
pub mod engine;

pub use decision::{Decision, DecisionContext, DecisionGate};
pub use engine::{DecisionEngine, DecisionError, HttpDecisionEngine, StaticDecisionEngine};
