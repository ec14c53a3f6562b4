//! The mint operation: a gated on-chain side effect.
//!
//! # Data Flow
//! ```text
//! acquire  → BlockchainClient + Wallet → MintSession
//! attempt  → build + sign mint(recipient, amount)      (retried)
//! gate     → decision context with artist, user, composition, tx hash
//! execute  → broadcast → wait for confirmations → health check
//! release  → return unsent nonces, stop the session
//! ```
//!
//! # Design Decisions
//! - Signing is the retried external call; nothing reaches the chain before
//!   the gate allows it
//! - Once broadcast, later failures carry `partial` so the audit shows the
//!   inconsistency window

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::transaction::{SignedTx, TxBuilder};
use crate::blockchain::types::{BlockchainConfig, BlockchainError, ConfirmationStatus};
use crate::blockchain::wallet::Wallet;
use crate::config::schema::MintConfig;
use crate::gate::decision::DecisionContext;
use crate::pipeline::operation::{EffectError, EffectReport, GatedOperation, OperationError};
use crate::resilience::retries::AttemptResult;
use crate::validation::request::Target;
use crate::validation::validator::{FieldKind, FieldRule, RequestSchema, ValidatedRequest};

sol! {
    /// Token contract entry point.
    function mint(address to, uint256 amount);
}

pub const MINT_OPERATION: &str = "mint";

/// Handle held for one mint run.
#[derive(Debug, Clone)]
pub struct MintSession {
    tx: Arc<TxBuilder>,
}

impl MintSession {
    pub fn signer(&self) -> Address {
        self.tx.address()
    }
}

/// A signed mint waiting for the gate.
#[derive(Debug, Clone)]
pub struct PreparedMint {
    pub recipient: Address,
    pub amount: U256,
    pub signed: SignedTx,
}

/// Mints tokens for an artist/user pair once the decision engine agrees.
#[derive(Debug, Clone)]
pub struct MintOperation {
    blockchain: BlockchainConfig,
    mint: MintConfig,
    contract: Address,
    /// One wallet for every session so nonces are reserved in one place.
    wallet: Wallet,
}

impl MintOperation {
    pub fn new(blockchain: BlockchainConfig, mint: MintConfig, wallet: Wallet) -> Result<Self, BlockchainError> {
        let contract = mint.contract_address.parse::<Address>().map_err(|e| {
            BlockchainError::NotAvailable(format!(
                "invalid mint contract address '{}': {}",
                mint.contract_address, e
            ))
        })?;

        Ok(Self {
            blockchain,
            mint,
            contract,
            wallet,
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    fn amount(&self, request: &ValidatedRequest<'_>) -> u64 {
        let requested = match request.field("amount") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        requested.unwrap_or(self.mint.default_amount)
    }
}

fn recipient_of(request: &ValidatedRequest<'_>) -> Option<Address> {
    request.text("recipient").and_then(|s| s.trim().parse().ok())
}

fn check_address(value: &Value) -> Result<(), String> {
    let raw = value.as_str().ok_or_else(|| "must be an address string".to_string())?;
    raw.trim()
        .parse::<Address>()
        .map(|_| ())
        .map_err(|e| format!("invalid address: {}", e))
}

fn composition_of<'a>(request: &ValidatedRequest<'a>) -> Option<&'a str> {
    match &request.request().target {
        Target::Composition(descriptor) => Some(descriptor),
        _ => None,
    }
}

fn attempt_failure<T>(e: BlockchainError) -> AttemptResult<T> {
    if e.is_transient() {
        AttemptResult::TransientFailure(e.to_string())
    } else {
        AttemptResult::FatalFailure(e.to_string())
    }
}

#[async_trait]
impl GatedOperation for MintOperation {
    type Resource = MintSession;
    type Payload = PreparedMint;

    fn name(&self) -> &str {
        MINT_OPERATION
    }

    fn schema(&self) -> RequestSchema {
        RequestSchema::new(MINT_OPERATION)
            .field(FieldRule::required("artist_id", FieldKind::Text))
            .field(FieldRule::required("user_id", FieldKind::Text))
            .field(FieldRule::required("recipient", FieldKind::Custom(check_address)))
            .field(FieldRule::optional("amount", FieldKind::PositiveInteger))
    }

    async fn acquire(&self) -> Result<MintSession, OperationError> {
        let client = BlockchainClient::new(self.blockchain.clone())
            .await
            .map_err(|e| OperationError::Fatal(e.to_string()))?;

        let wallet = self.wallet.clone();
        tracing::info!(signer = %wallet.address(), contract = %self.contract, "Mint session started");
        Ok(MintSession {
            tx: Arc::new(TxBuilder::new(client, wallet)),
        })
    }

    async fn release(&self, session: MintSession) -> Result<(), OperationError> {
        let returned = session.tx.release_unsent();
        if returned > 0 {
            tracing::info!(signer = %session.signer(), returned, "Unsent mint nonces returned");
        }
        tracing::info!(signer = %session.signer(), "Mint session stopped");
        Ok(())
    }

    /// Create the artifact: a signed `mint` transaction.
    async fn attempt(
        &self,
        session: &MintSession,
        request: &ValidatedRequest<'_>,
    ) -> AttemptResult<PreparedMint> {
        let Some(recipient) = recipient_of(request) else {
            return AttemptResult::FatalFailure("recipient is not a valid address".to_string());
        };
        let amount = U256::from(self.amount(request));

        let data = mintCall { to: recipient, amount }.abi_encode();
        match session.tx.sign(self.contract, data.into(), self.mint.gas_limit).await {
            Ok(signed) => AttemptResult::Success(PreparedMint {
                recipient,
                amount,
                signed,
            }),
            Err(e) => attempt_failure(e),
        }
    }

    fn decision_context(&self, request: &ValidatedRequest<'_>, payload: &PreparedMint) -> DecisionContext {
        let mut fields = BTreeMap::new();
        for name in ["artist_id", "user_id"] {
            if let Some(value) = request.field(name) {
                fields.insert(name.to_string(), value.clone());
            }
        }
        if let Some(composition) = composition_of(request) {
            fields.insert("composition".to_string(), Value::String(composition.to_string()));
        }

        DecisionContext {
            operation: MINT_OPERATION.to_string(),
            operation_id: request.id().to_string(),
            fields,
            payload: json!({
                "contract": self.contract.to_string(),
                "recipient": payload.recipient.to_string(),
                "amount": payload.amount.to_string(),
                "tx_hash": payload.signed.tx_hash.to_string(),
            }),
        }
    }

    /// Perform the action, then check the chain is still healthy.
    async fn execute(
        &self,
        session: &MintSession,
        _request: &ValidatedRequest<'_>,
        payload: PreparedMint,
    ) -> Result<EffectReport, EffectError> {
        let tx_hash = session
            .tx
            .broadcast(&payload.signed)
            .await
            .map_err(|e| EffectError::before_effect(e.to_string()))?;

        let block_number = match session
            .tx
            .wait_for_confirmation(tx_hash, self.mint.confirmation_timeout_secs)
            .await
        {
            Ok(ConfirmationStatus::Confirmed { block_number }) => block_number,
            Ok(ConfirmationStatus::Failed(reason)) => {
                return Err(EffectError::before_effect(format!("mint {} failed: {}", tx_hash, reason)));
            }
            Err(e) => {
                return Err(EffectError::after_effect(format!(
                    "mint {} broadcast but not confirmed: {}",
                    tx_hash, e
                )));
            }
        };

        if !session.tx.client().is_healthy().await {
            return Err(EffectError::after_effect(format!(
                "post-mint health check failed after {} confirmed in block {}",
                tx_hash, block_number
            )));
        }

        Ok(EffectReport::new(json!({
            "tx_hash": tx_hash.to_string(),
            "block_number": block_number,
            "recipient": payload.recipient.to_string(),
            "amount": payload.amount.to_string(),
        })))
    }
}
