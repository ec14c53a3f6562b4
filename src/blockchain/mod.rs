//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key), config (RPC URLs, contract)
//!     → wallet.rs (key loading, nonce tracking)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (build, sign, broadcast, confirm)
//!     → minter.rs (the gated mint operation)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod minter;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use minter::{MintOperation, MintSession, PreparedMint};
pub use types::{BlockchainConfig, BlockchainError, ChainId};
pub use wallet::Wallet;
