//! Resilient gated operation pipeline.
//!
//! Validates a request, retries its external call with backoff, asks a
//! decision gate, performs the side effect, and audits the outcome, all
//! inside a scope that always releases its resource.

// Pipeline core
pub mod gate;
pub mod pipeline;
pub mod resilience;
pub mod validation;

// Collaborators
pub mod audit;
pub mod blockchain;
pub mod registry;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::PipelineConfig;
pub use lifecycle::shutdown::{CancelToken, CancellationSignal};
pub use pipeline::{GatedOperation, Pipeline, PipelineReport};
