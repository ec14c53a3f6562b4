//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults when absent)
//!     → environment overrides (REGISTRY_ADDR, LOG_FILE)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → passed into component constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Environment is read once at load time, never inside business logic

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuditConfig, BackoffStrategy, BlockchainConfig, DecisionConfig, MintConfig, ObservabilityConfig,
    PipelineConfig, RegistryConfig, RetryConfig, WorkerConfig,
};
