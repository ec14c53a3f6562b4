//! Wallet management for the mint signer.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "GATED_PIPELINE_PRIVATE_KEY";

/// Nonces handed out but not yet broadcast or given back.
#[derive(Debug, Default)]
struct NonceState {
    next: u64,
    outstanding: BTreeSet<u64>,
}

/// Signing key with nonce tracking.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    /// Shared between clones so concurrent mints never reuse a nonce.
    nonces: Arc<Mutex<NonceState>>,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// Accepts the key with or without a `0x` prefix.
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self {
            signer,
            nonces: Arc::new(Mutex::new(NonceState::default())),
            chain_id,
        })
    }

    /// Load the wallet from `GATED_PIPELINE_PRIVATE_KEY`.
    pub fn from_env(chain_id: u64) -> BlockchainResult<Self> {
        Self::from_lookup(chain_id, |name| std::env::var(name).ok())
    }

    /// Load the wallet through an explicit environment lookup.
    pub fn from_lookup<F>(chain_id: u64, env: F) -> BlockchainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let private_key = env(PRIVATE_KEY_ENV_VAR).ok_or_else(|| {
            BlockchainError::Wallet(format!("Environment variable {} not set", PRIVATE_KEY_ENV_VAR))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Signing wallet for transaction envelopes.
    pub fn network_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    fn nonce_state(&self) -> MutexGuard<'_, NonceState> {
        self.nonces.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve the next nonce given the chain's pending transaction count.
    ///
    /// With nothing outstanding the chain count is authoritative, so a gap
    /// left by an unsent transaction is filled by the next one.
    pub fn reserve_nonce(&self, chain_nonce: u64) -> u64 {
        let mut state = self.nonce_state();
        state.next = if state.outstanding.is_empty() {
            chain_nonce
        } else {
            state.next.max(chain_nonce)
        };
        let nonce = state.next;
        state.next += 1;
        state.outstanding.insert(nonce);
        nonce
    }

    /// The transaction carrying `nonce` was accepted by the node.
    pub fn settle_nonce(&self, nonce: u64) {
        self.nonce_state().outstanding.remove(&nonce);
    }

    /// The transaction carrying `nonce` will never be broadcast.
    pub fn release_nonce(&self, nonce: u64) {
        let mut state = self.nonce_state();
        if state.outstanding.remove(&nonce) && state.next == nonce + 1 {
            state.next = nonce;
        }
    }

    /// Nonce the next reservation would use if the chain agrees.
    pub fn next_nonce(&self) -> u64 {
        self.nonce_state().next
    }

    pub fn outstanding_nonces(&self) -> usize {
        self.nonce_state().outstanding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        assert_eq!(wallet.address().to_string().to_lowercase(), TEST_ADDRESS);
        assert_eq!(wallet.chain_id(), 1);
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1).unwrap();
        assert_eq!(wallet.address().to_string().to_lowercase(), TEST_ADDRESS);
    }

    #[test]
    fn test_from_lookup() {
        let wallet = Wallet::from_lookup(31337, |name| {
            (name == PRIVATE_KEY_ENV_VAR).then(|| TEST_PRIVATE_KEY.to_string())
        })
        .unwrap();
        assert_eq!(wallet.address().to_string().to_lowercase(), TEST_ADDRESS);

        let err = Wallet::from_lookup(31337, |_| None).unwrap_err();
        assert!(err.to_string().contains(PRIVATE_KEY_ENV_VAR));
    }

    #[test]
    fn test_nonce_management() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();

        assert_eq!(wallet.reserve_nonce(0), 0);
        assert_eq!(wallet.reserve_nonce(0), 1);
        assert_eq!(wallet.outstanding_nonces(), 2);

        // chain ahead of us while transactions are in flight
        assert_eq!(wallet.reserve_nonce(100), 100);
        assert_eq!(wallet.reserve_nonce(50), 101);

        let clone = wallet.clone();
        for nonce in [0, 1, 100, 101] {
            clone.settle_nonce(nonce);
        }
        assert_eq!(wallet.outstanding_nonces(), 0);
        assert_eq!(wallet.reserve_nonce(102), 102);
    }

    #[test]
    fn test_unsent_nonce_is_reused() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();

        let denied = wallet.reserve_nonce(5);
        assert_eq!(denied, 5);
        wallet.release_nonce(denied);
        assert_eq!(wallet.next_nonce(), 5);

        // chain still at 5: the next mint must not skip ahead
        assert_eq!(wallet.reserve_nonce(5), 5);
    }

    #[test]
    fn test_gap_closes_once_nothing_outstanding() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();

        let first = wallet.reserve_nonce(5);
        let second = wallet.reserve_nonce(5);
        assert_eq!((first, second), (5, 6));

        // the older one is dropped while the newer one is still pending
        wallet.release_nonce(first);
        assert_eq!(wallet.next_nonce(), 7);
        wallet.release_nonce(second);

        assert_eq!(wallet.outstanding_nonces(), 0);
        assert_eq!(wallet.reserve_nonce(5), 5);
    }

    #[test]
    fn test_clones_share_reservations() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let clone = wallet.clone();

        assert_eq!(wallet.reserve_nonce(3), 3);
        assert_eq!(clone.reserve_nonce(3), 4);
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key", 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }
}
