//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, `[ISO8601] [LEVEL] message`)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout and the configured log file
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Operation id and run id flow through every pipeline log line
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
