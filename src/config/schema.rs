//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Service registry and discovery settings.
    pub registry: RegistryConfig,

    /// Retry and backoff policy for external calls.
    pub retries: RetryConfig,

    /// Decision engine settings.
    pub decision: DecisionConfig,

    /// Audit ledger locations.
    pub audit: AuditConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Concurrent worker settings.
    pub workers: WorkerConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// Mint operation settings.
    pub mint: MintConfig,
}

/// Service registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry agent address (host:port), overridable by `REGISTRY_ADDR`.
    pub address: String,

    /// Directory tree scanned for service definition documents.
    pub discovery_dir: PathBuf,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Verify the service is visible after registering it.
    pub verify_registration: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8500".to_string(),
            discovery_dir: PathBuf::from("./services"),
            request_timeout_secs: 10,
            verify_registration: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Fixed delay, or exponential base, in milliseconds.
    pub base_delay_ms: u64,

    pub backoff: BackoffStrategy,

    /// Exponential growth factor.
    pub multiplier: f64,

    /// Cap for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Fraction of the delay added as random jitter (0.0 disables).
    pub jitter_ratio: f64,

    /// Per-attempt deadline in seconds (0 disables).
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            backoff: BackoffStrategy::Fixed,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter_ratio: 0.0,
            attempt_timeout_secs: 30,
        }
    }
}

/// Decision engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// HTTP endpoint receiving decision contexts.
    pub endpoint: Option<String>,

    /// Verdict keywords that authorize the side effect (case-insensitive).
    pub affirmative_keywords: Vec<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            affirmative_keywords: vec!["boost".to_string()],
            timeout_secs: 10,
        }
    }
}

/// Audit ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory for append-only audit and transaction files.
    pub directory: PathBuf,

    /// Directory receiving records the primary ledger could not store.
    pub dead_letter_directory: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./audit"),
            dead_letter_directory: PathBuf::from("./audit/dead_letter"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log file, overridable by `LOG_FILE`.
    pub log_file: Option<PathBuf>,

    /// Prometheus exporter bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: Some(PathBuf::from("registration.log")),
            metrics_address: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Requests processed concurrently by a batch run.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            confirmation_blocks: 3,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Mint operation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MintConfig {
    /// Address of the token contract exposing `mint(address,uint256)`.
    pub contract_address: String,

    /// Amount minted when the request carries none.
    pub default_amount: u64,

    /// Gas limit for the mint call.
    pub gas_limit: u64,

    /// Maximum time to wait for confirmations in seconds.
    pub confirmation_timeout_secs: u64,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            default_amount: 1,
            gas_limit: 150_000,
            confirmation_timeout_secs: 120,
        }
    }
}
