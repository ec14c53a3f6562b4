//! Transaction building, signing, and confirmation monitoring.
//!
//! # Responsibilities
//! - Build contract calls with a gas price guard
//! - Sign them locally into broadcastable envelopes
//! - Broadcast and monitor confirmations
//!
//! # Design Decisions
//! - Signing and broadcasting are separate steps: a signed transaction is
//!   a value that can be inspected (and gated) before anything hits the chain
//! - A nonce is reserved at build time and either settled by a broadcast or
//!   given back by `release_unsent`, so a denied mint leaves no gap

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};
use crate::blockchain::wallet::Wallet;

/// A locally signed transaction, not yet broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub raw: Bytes,
}

/// Transaction builder bound to one client and signer.
#[derive(Debug)]
pub struct TxBuilder {
    client: BlockchainClient,
    wallet: Wallet,
    /// Nonces this builder reserved that have not been broadcast.
    reserved: Mutex<BTreeSet<u64>>,
}

impl TxBuilder {
    pub fn new(client: BlockchainClient, wallet: Wallet) -> Self {
        Self {
            client,
            wallet,
            reserved: Mutex::new(BTreeSet::new()),
        }
    }

    pub(crate) fn reserve_nonce(&self, chain_nonce: u64) -> u64 {
        let nonce = self.reserve_nonce(chain_nonce);
        if let Ok(mut reserved) = self.reserved.lock() {
            reserved.insert(nonce);
        }
        nonce
    }

    fn give_back(&self, nonce: u64) {
        if let Ok(mut reserved) = self.reserved.lock() {
            reserved.remove(&nonce);
        }
        self.wallet.release_nonce(nonce);
    }

    /// Return every reserved nonce that never reached the chain.
    pub fn release_unsent(&self) -> usize {
        let unsent = match self.reserved.lock() {
            Ok(mut reserved) => std::mem::take(&mut *reserved),
            Err(_) => return 0,
        };
        for nonce in unsent.iter().rev() {
            self.wallet.release_nonce(*nonce);
        }
        unsent.len()
    }

    pub fn client(&self) -> &BlockchainClient {
        &self.client
    }

    /// Build a call to `to` with price checks and the next nonce.
    pub async fn build(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
        gas_limit: u64,
    ) -> BlockchainResult<TransactionRequest> {
        let chain_nonce = self.client.get_transaction_count(self.wallet.address()).await?;
        let gas_price = self.client.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;

        let config = self.client.config();
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }

        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;
        let nonce = self.reserve_nonce(chain_nonce);

        Ok(TransactionRequest::default()
            .with_from(self.wallet.address())
            .with_to(to)
            .with_value(value)
            .with_input(data)
            .with_nonce(nonce)
            .with_gas_price(adjusted_gas_price)
            .with_chain_id(self.wallet.chain_id())
            .with_gas_limit(gas_limit))
    }

    /// Build and sign a call without broadcasting it.
    pub async fn sign(&self, to: Address, data: Bytes, gas_limit: u64) -> BlockchainResult<SignedTx> {
        let request = self.build(to, U256::ZERO, data, gas_limit).await?;
        let nonce = request.nonce.unwrap_or_default();

        let envelope = match request.build(&self.wallet.network_wallet()).await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.give_back(nonce);
                return Err(BlockchainError::Build(e.to_string()));
            }
        };

        let signed = SignedTx {
            tx_hash: *envelope.tx_hash(),
            nonce,
            raw: Bytes::from(envelope.encoded_2718()),
        };

        tracing::debug!(tx_hash = %signed.tx_hash, nonce, "Transaction signed");
        Ok(signed)
    }

    /// Broadcast a signed transaction.
    ///
    /// A rejected broadcast gives its nonce back.
    pub async fn broadcast(&self, signed: &SignedTx) -> BlockchainResult<TxHash> {
        match self.client.send_raw_transaction(&signed.raw).await {
            Ok(tx_hash) => {
                if let Ok(mut reserved) = self.reserved.lock() {
                    reserved.remove(&signed.nonce);
                }
                self.wallet.settle_nonce(signed.nonce);
                tracing::info!(tx_hash = %tx_hash, nonce = signed.nonce, "Transaction broadcast");
                Ok(tx_hash)
            }
            Err(e) => {
                self.give_back(signed.nonce);
                Err(e)
            }
        }
    }

    /// Wait for a transaction to be confirmed.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout_secs: u64,
    ) -> BlockchainResult<ConfirmationStatus> {
        let required_confirmations = self.client.confirmation_blocks();
        let timeout_duration = Duration::from_secs(timeout_secs);
        let poll_interval = Duration::from_secs(2);

        let result = timeout(timeout_duration, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.client.get_transaction_receipt(tx_hash).await? {
                    Some(r) => r,
                    None => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
                }

                let current_block = self.client.get_block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block) as u32;

                if confirmations >= required_confirmations {
                    return Ok(ConfirmationStatus::Confirmed {
                        block_number: tx_block,
                    });
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required_confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(required_confirmations)),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}
