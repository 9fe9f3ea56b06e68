//! Remote executor submitting operations through an injected wallet.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::leaderboard::{ScoreRecord, ScoreSink, SyncError};
use crate::ledger::{
    ContractCall, ExecutionError, ExecutionMode, LedgerBridge, Operation, RawOutcome, RawReceipt,
    ReceiptEventExtractor, ReceiptSchema, encode_scalar, entrypoints,
};

/// Failure reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum WalletError {
    /// The account refused to sign or send the call.
    #[display("rejected: {_0}")]
    Rejected(#[error(not(source))] String),
    /// The provider could not be reached or answered with an error.
    #[display("transport: {_0}")]
    Transport(#[error(not(source))] String),
}

/// Account capability injected into the remote executor.
///
/// Key custody and session-key provisioning live behind this trait.
#[async_trait]
pub trait WalletProvider: Send + Sync + Debug {
    /// Address of the signing account.
    fn address(&self) -> &str;

    /// Signs and submits `call`, returning the transaction hash.
    async fn execute(&self, call: &ContractCall) -> Result<String, WalletError>;

    /// Fetches the receipt of `tx_hash`, `None` while still pending.
    async fn receipt(&self, tx_hash: &str) -> Result<Option<serde_json::Value>, WalletError>;

    /// Performs a read-only call.
    async fn call(&self, call: &ContractCall) -> Result<Vec<String>, WalletError>;
}

/// Bounded wait for transaction confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct ConfirmationPolicy {
    /// Total time to wait for a receipt.
    timeout: Duration,
    /// Delay between receipt polls.
    poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_millis(1000))
    }
}

/// Submits operations to a contract through a [`WalletProvider`].
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    wallet: Arc<dyn WalletProvider>,
    contract_address: String,
    schema: ReceiptSchema,
    policy: ConfirmationPolicy,
    extractor: ReceiptEventExtractor,
}

impl RemoteExecutor {
    /// Creates an executor targeting `contract_address`.
    #[instrument(skip(wallet), fields(account = %wallet.address()))]
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        contract_address: String,
        schema: ReceiptSchema,
        policy: ConfirmationPolicy,
    ) -> Self {
        info!("Creating remote executor");
        Self {
            wallet,
            contract_address,
            schema,
            policy,
            extractor: ReceiptEventExtractor::new(),
        }
    }

    /// Address of the submitting account.
    pub fn account_address(&self) -> &str {
        self.wallet.address()
    }

    /// Submits `call` and waits for its confirmed receipt.
    ///
    /// # Errors
    ///
    /// `InvalidAccount` if the account rejects the call, `ConfirmationTimeout`
    /// if no receipt arrives in time, `ProviderError` otherwise, including
    /// reverted transactions.
    #[instrument(skip(self, call), fields(entrypoint = %call.entrypoint()))]
    pub async fn invoke(&self, call: &ContractCall) -> Result<RawReceipt, ExecutionError> {
        let tx_hash = self.wallet.execute(call).await.map_err(|e| wallet_failure(e))?;
        info!(tx_hash = %tx_hash, "Transaction submitted");

        let body = self.wait_for_receipt(&tx_hash).await?;
        let receipt = RawReceipt::new(self.schema, tx_hash, body);

        // Reverts are provider failures; other decode problems are left to the extractor.
        if let Ok(parsed) = self.extractor.parse(&receipt)
            && let Some(reason) = parsed.revert_reason()
        {
            warn!(tx_hash = %receipt.tx_hash(), reason = %reason, "Transaction reverted");
            return Err(ExecutionError::provider(format!(
                "transaction {} reverted: {reason}",
                receipt.tx_hash()
            )));
        }

        info!(tx_hash = %receipt.tx_hash(), "Transaction confirmed");
        Ok(receipt)
    }

    #[instrument(skip(self))]
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<serde_json::Value, ExecutionError> {
        let started = Instant::now();
        let poll = async {
            loop {
                match self.wallet.receipt(tx_hash).await {
                    Ok(Some(body)) => return Ok(body),
                    Ok(None) => {
                        debug!("Receipt pending");
                        tokio::time::sleep(self.policy.poll_interval).await;
                    }
                    Err(e) => return Err(ExecutionError::provider(e.to_string())),
                }
            }
        };

        match tokio::time::timeout(self.policy.timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(waited_ms, "Confirmation wait exhausted");
                Err(ExecutionError::confirmation_timeout(tx_hash, waited_ms))
            }
        }
    }
}

#[track_caller]
fn wallet_failure(error: WalletError) -> ExecutionError {
    match error {
        WalletError::Rejected(reason) => ExecutionError::invalid_account(reason),
        WalletError::Transport(reason) => ExecutionError::provider(reason),
    }
}

#[async_trait]
impl LedgerBridge for RemoteExecutor {
    #[instrument(
        skip(self),
        fields(entrypoint = operation.entrypoint(), session_id = ?operation.session_id())
    )]
    async fn submit(&self, operation: Operation) -> Result<RawOutcome, ExecutionError> {
        let call = operation.to_call(&self.contract_address);
        debug!(calldata = ?call.calldata(), "Encoded contract call");

        if operation.is_read() {
            let felts = self.wallet.call(&call).await.map_err(|e| wallet_failure(e))?;
            debug!(felts = felts.len(), "Read call returned");
            return Ok(RawOutcome::CallResult(felts));
        }

        let receipt = self.invoke(&call).await?;
        Ok(RawOutcome::Receipt(receipt))
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Remote
    }
}

#[async_trait]
impl ScoreSink for RemoteExecutor {
    #[instrument(skip(self, record), fields(player = %record.player_id(), score = record.score()))]
    async fn submit_score(&self, record: &ScoreRecord) -> Result<(), SyncError> {
        let calldata = vec![
            encode_scalar(*record.score()),
            encode_scalar(u64::from(*record.moves())),
            encode_scalar(record.elapsed_seconds().max(0.0).round() as u64),
            encode_scalar(record.difficulty().code()),
        ];
        let call = ContractCall::new(
            self.contract_address.clone(),
            entrypoints::SUBMIT_SCORE.to_string(),
            calldata,
        );
        self.invoke(&call)
            .await
            .map_err(|e| SyncError::remote_submission(e.to_string()))?;
        Ok(())
    }
}
