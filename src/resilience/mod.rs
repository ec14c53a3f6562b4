//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! External call for one request:
//!     → timeouts.rs (per-attempt deadline, overrun = transient)
//!     → retries.rs (classify attempt, retry transient failures)
//!     → backoff.rs (fixed or exponential delay, optional jitter)
//!     → sleeper.rs (suspend the worker; recorded in tests)
//! ```
//!
//! # Design Decisions
//! - Attempts are strictly sequential within one request
//! - Only transient failures are retried; fatal failures stop the loop
//! - Exhaustion is a distinct outcome carrying the last cause
//! - Backoff sleeping is injectable so tests never wait on the clock

pub mod backoff;
pub mod retries;
pub mod sleeper;
pub mod timeouts;

pub use backoff::{Backoff, BackoffPolicy};
pub use retries::{AttemptResult, RetryConfigError, RetryExecutor, RetryOutcome};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
