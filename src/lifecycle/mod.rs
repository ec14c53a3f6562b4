//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Preflight dependency checks → exit 1 on anything missing
//!
//! Per run (scope.rs):
//!     acquire → body → release (exactly once, panics included)
//!
//! Cancellation (shutdown.rs, signals.rs):
//!     Ctrl-C → CancellationSignal::cancel → every CancelToken observes it
//!     → in-flight runs stop before their next attempt or backoff
//! ```
//!
//! # Design Decisions
//! - Cancelled runs still reach a terminal state and are audited
//! - A second Ctrl-C is not special; runs wind down on their own

pub mod scope;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use scope::{with_scope, ScopeError};
pub use shutdown::{CancelToken, CancellationSignal};
