//! Startup preflight.
//!
//! # Responsibilities
//! - Check that everything an operation depends on is present before any
//!   request is processed
//! - Report every missing dependency at once
//!
//! # Design Decisions
//! - Fail fast: the binary exits with code 1 when anything is missing
//! - Checks are pure over config plus an environment lookup, so they test
//!   without touching the process environment

use alloy::primitives::Address;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::blockchain::wallet::PRIVATE_KEY_ENV_VAR;
use crate::config::schema::PipelineConfig;

/// A dependency the requested operation cannot run without.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingDependency {
    #[error("discovery directory {0} does not exist")]
    DiscoveryDirectory(PathBuf),

    #[error("decision endpoint is not configured (decision.endpoint)")]
    DecisionEndpoint,

    #[error("mint contract address is missing or invalid: {0:?}")]
    MintContract(String),

    #[error("environment variable {0} is not set")]
    EnvironmentVariable(&'static str),
}

/// Preflight for `register`: the discovery directory must exist.
pub fn check_register(dir: &Path) -> Vec<MissingDependency> {
    if dir.is_dir() {
        Vec::new()
    } else {
        vec![MissingDependency::DiscoveryDirectory(dir.to_path_buf())]
    }
}

/// Preflight for `mint`: gate endpoint, contract and signing key.
pub fn check_mint<F>(config: &PipelineConfig, env: F) -> Vec<MissingDependency>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();

    if config.decision.endpoint.as_deref().map_or(true, |e| e.trim().is_empty()) {
        missing.push(MissingDependency::DecisionEndpoint);
    }

    if config.mint.contract_address.parse::<Address>().is_err() {
        missing.push(MissingDependency::MintContract(config.mint.contract_address.clone()));
    }

    if env(PRIVATE_KEY_ENV_VAR).map_or(true, |v| v.trim().is_empty()) {
        missing.push(MissingDependency::EnvironmentVariable(PRIVATE_KEY_ENV_VAR));
    }

    missing
}

/// Log every missing dependency; `true` when nothing is missing.
pub fn report(missing: &[MissingDependency]) -> bool {
    for dependency in missing {
        tracing::error!(dependency = %dependency, "Missing required dependency");
    }
    missing.is_empty()
}
