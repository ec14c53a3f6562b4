//! JSON-RPC access for the mint signer.
//!
//! Every read goes to the primary node first and falls through the
//! configured failovers in order; each call is bounded by `rpc_timeout_secs`.
//! The mint path uses it for the pending nonce, gas price, the raw
//! broadcast, receipt polling and the post-mint health check.

use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};

type Node = Arc<dyn Provider + Send + Sync>;

/// Primary node plus failovers.
#[derive(Clone)]
pub struct BlockchainClient {
    nodes: Vec<Node>,
    config: BlockchainConfig,
    call_timeout: Duration,
}

impl BlockchainClient {
    /// Connect to the configured nodes.
    ///
    /// Only a malformed primary URL is an error. An unreachable node or a
    /// chain id mismatch is logged and surfaces later as a transient attempt
    /// failure.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let primary: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e)))?;

        let mut nodes: Vec<Node> = vec![Arc::new(ProviderBuilder::new().connect_http(primary))];
        for raw in &config.failover_urls {
            match raw.parse::<url::Url>() {
                Ok(url) => nodes.push(Arc::new(ProviderBuilder::new().connect_http(url))),
                Err(_) => tracing::warn!(url = %raw, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            nodes,
            call_timeout: Duration::from_secs(config.rpc_timeout_secs),
            config,
        };

        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %client.config.rpc_url,
                chain_id = client.config.chain_id,
                failovers = client.nodes.len() - 1,
                "Mint RPC connected"
            ),
            Err(e) => tracing::warn!(error = %e, "Mint RPC not verified; minting will retry against it"),
        }

        Ok(client)
    }

    /// Run `call` against each node in turn until one answers.
    async fn first_answer<T, E, F, Fut>(&self, what: &str, call: F) -> BlockchainResult<T>
    where
        F: Fn(Node) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        for (i, node) in self.nodes.iter().enumerate() {
            match timeout(self.call_timeout, call(node.clone())).await {
                Ok(Ok(answer)) => return Ok(answer),
                Ok(Err(e)) => tracing::warn!(node = i, what, error = %e, "RPC error, trying next node"),
                Err(_) => tracing::warn!(node = i, what, "RPC timeout, trying next node"),
            }
        }
        Err(BlockchainError::Rpc(format!("All RPC providers failed to {}", what)))
    }

    /// Refuse to sign for a node on the wrong chain.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = self.get_chain_id().await?;
        if actual.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: actual.0,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.first_answer("get chain id", |node| async move { node.get_chain_id().await })
            .await
            .map(ChainId)
    }

    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.first_answer("get block number", |node| async move { node.get_block_number().await })
            .await
    }

    /// Pending transaction count for an address, including mempool entries.
    pub async fn get_transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.first_answer("get transaction count", move |node| async move {
            node.get_transaction_count(address).pending().await
        })
        .await
    }

    /// Receipt for a broadcast mint, `None` while it is still pending.
    pub async fn get_transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>> {
        self.first_answer("get receipt", move |node| async move {
            node.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Gas price in wei.
    pub async fn get_gas_price(&self) -> BlockchainResult<u128> {
        self.first_answer("get gas price", |node| async move { node.get_gas_price().await })
            .await
    }

    /// Broadcast a signed, EIP-2718 encoded transaction.
    ///
    /// Resending the same bytes to a failover yields the same hash, so
    /// trying the next node is safe. A revert reported by any node wins over
    /// plain transport errors.
    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> BlockchainResult<TxHash> {
        let mut rejection = None;
        for (i, node) in self.nodes.iter().enumerate() {
            match timeout(self.call_timeout, node.send_raw_transaction(encoded)).await {
                Ok(Ok(pending)) => return Ok(*pending.tx_hash()),
                Ok(Err(e)) => {
                    tracing::warn!(node = i, error = %e, "Broadcast rejected");
                    rejection = Some(e.to_string());
                }
                Err(_) => tracing::warn!(node = i, "Broadcast timeout"),
            }
        }
        match rejection {
            Some(e) if e.contains("revert") => Err(BlockchainError::Reverted(e)),
            Some(e) => Err(BlockchainError::Rpc(format!("All RPC providers failed to broadcast: {}", e))),
            None => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    /// Post-mint check: some node still serves the chain head.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        tracing::debug!(healthy, "Mint RPC health check");
        healthy
    }

    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("nodes", &self.nodes.len())
            .field("chain_id", &self.config.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> BlockchainConfig {
        BlockchainConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            chain_id: 31337,
            rpc_timeout_secs: 2,
            ..BlockchainConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connects_without_a_node() {
        let client = BlockchainClient::new(offline_config()).await.unwrap();
        assert_eq!(client.confirmation_blocks(), client.config().confirmation_blocks);
        assert!(format!("{:?}", client).contains("nodes: 1"));
    }

    #[tokio::test]
    async fn test_every_node_is_tried() {
        let mut config = offline_config();
        config.failover_urls = vec!["http://127.0.0.1:2".to_string(), "not a url".to_string()];

        let client = BlockchainClient::new(config).await.unwrap();
        assert!(format!("{:?}", client).contains("nodes: 2"));

        let err = client.get_transaction_count(Address::ZERO).await.unwrap_err();
        assert!(err.to_string().contains("All RPC providers failed to get transaction count"));
        assert!(err.is_transient());
        assert!(!client.is_healthy().await);
    }

    #[tokio::test]
    async fn test_broadcast_to_unreachable_nodes_fails() {
        let client = BlockchainClient::new(offline_config()).await.unwrap();
        let err = client.send_raw_transaction(&[0x02, 0xc0]).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_primary_url() {
        let mut config = offline_config();
        config.rpc_url = "not a url".to_string();
        let err = BlockchainClient::new(config).await.unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }
}
