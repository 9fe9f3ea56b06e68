//! Tests for the remote executor against a scripted wallet.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use memorabilia::{
    ConfirmationPolicy, ContractCall, Difficulty, ExecutionErrorKind, ExecutionMode,
    LedgerBridge, Operation, RawOutcome, ReceiptSchema, RemoteExecutor, ScoreRecord, ScoreSink,
    WalletError, WalletProvider,
};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Debug, Default)]
struct ScriptedWallet {
    execute_results: Mutex<VecDeque<Result<String, WalletError>>>,
    receipts: Mutex<VecDeque<Result<Option<serde_json::Value>, WalletError>>>,
    call_result: Mutex<Option<Result<Vec<String>, WalletError>>>,
    executed: Mutex<Vec<ContractCall>>,
}

impl ScriptedWallet {
    fn submits(self, tx_hash: &str) -> Self {
        self.execute_results
            .lock()
            .push_back(Ok(tx_hash.to_string()));
        self
    }

    fn rejects(self, reason: &str) -> Self {
        self.execute_results
            .lock()
            .push_back(Err(WalletError::Rejected(reason.to_string())));
        self
    }

    fn receipt(self, result: Result<Option<serde_json::Value>, WalletError>) -> Self {
        self.receipts.lock().push_back(result);
        self
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    fn address(&self) -> &str {
        "0xacc0"
    }

    async fn execute(&self, call: &ContractCall) -> Result<String, WalletError> {
        self.executed.lock().push(call.clone());
        self.execute_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(WalletError::Transport("no scripted result".to_string())))
    }

    async fn receipt(&self, _tx_hash: &str) -> Result<Option<serde_json::Value>, WalletError> {
        // An exhausted script keeps the transaction pending.
        self.receipts.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn call(&self, _call: &ContractCall) -> Result<Vec<String>, WalletError> {
        self.call_result
            .lock()
            .clone()
            .unwrap_or_else(|| Err(WalletError::Transport("no scripted call".to_string())))
    }
}

fn succeeded(tx_hash: &str, events: serde_json::Value) -> serde_json::Value {
    json!({
        "transaction_hash": tx_hash,
        "execution_status": "SUCCEEDED",
        "finality_status": "ACCEPTED_ON_L2",
        "events": events,
    })
}

fn executor(wallet: Arc<ScriptedWallet>, timeout: Duration) -> RemoteExecutor {
    RemoteExecutor::new(
        wallet,
        "0xworld".to_string(),
        ReceiptSchema::Rpc07,
        ConfirmationPolicy::new(timeout, Duration::from_millis(5)),
    )
}

#[tokio::test]
async fn test_write_waits_for_confirmed_receipt() {
    let wallet = Arc::new(
        ScriptedWallet::default()
            .submits("0x10")
            .receipt(Ok(None))
            .receipt(Ok(Some(succeeded(
                "0x10",
                json!([{ "keys": ["GameStarted"], "data": ["0x7"] }]),
            )))),
    );
    let exec = executor(wallet.clone(), Duration::from_secs(5));
    assert_eq!(exec.mode(), ExecutionMode::Remote);
    assert_eq!(exec.account_address(), "0xacc0");

    let outcome = exec
        .submit(Operation::StartGame {
            difficulty: Difficulty::Hard,
        })
        .await
        .expect("start_game");
    match outcome {
        RawOutcome::Receipt(receipt) => assert_eq!(receipt.tx_hash(), "0x10"),
        other => panic!("unexpected outcome {other:?}"),
    }

    let executed = wallet.executed.lock();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].contract_address(), "0xworld");
    assert_eq!(executed[0].entrypoint(), "start_game");
    assert_eq!(executed[0].calldata(), &vec!["3".to_string()]);
}

#[tokio::test]
async fn test_rejected_call_is_invalid_account() {
    let wallet = Arc::new(ScriptedWallet::default().rejects("session key expired"));
    let exec = executor(wallet, Duration::from_secs(5));
    let err = exec
        .submit(Operation::CheckMatch { session_id: 1 })
        .await
        .expect_err("rejected");
    assert!(matches!(err.kind, ExecutionErrorKind::InvalidAccount(_)));
}

#[tokio::test]
async fn test_pending_receipt_times_out() {
    let wallet = Arc::new(ScriptedWallet::default().submits("0x11"));
    let exec = executor(wallet, Duration::from_millis(50));
    let err = exec
        .submit(Operation::FlipCard {
            session_id: 1,
            tile_index: 0,
        })
        .await
        .expect_err("timeout");
    match err.kind {
        ExecutionErrorKind::ConfirmationTimeout { tx_hash, waited_ms } => {
            assert_eq!(tx_hash, "0x11");
            assert!(waited_ms >= 50);
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[tokio::test]
async fn test_receipt_transport_failure_is_provider_error() {
    let wallet = Arc::new(
        ScriptedWallet::default()
            .submits("0x12")
            .receipt(Err(WalletError::Transport("connection reset".to_string()))),
    );
    let exec = executor(wallet, Duration::from_secs(5));
    let err = exec
        .submit(Operation::AbandonGame { session_id: 4 })
        .await
        .expect_err("transport");
    assert!(matches!(err.kind, ExecutionErrorKind::ProviderError(_)));
}

#[tokio::test]
async fn test_reverted_transaction_is_provider_error() {
    let wallet = Arc::new(ScriptedWallet::default().submits("0x13").receipt(Ok(Some(json!({
        "transaction_hash": "0x13",
        "execution_status": "REVERTED",
        "finality_status": "ACCEPTED_ON_L2",
        "revert_reason": "game not active",
    })))));
    let exec = executor(wallet, Duration::from_secs(5));
    let err = exec
        .submit(Operation::CheckMatch { session_id: 4 })
        .await
        .expect_err("reverted");
    match err.kind {
        ExecutionErrorKind::ProviderError(message) => assert!(message.contains("game not active")),
        other => panic!("unexpected kind {other:?}"),
    }
}

#[tokio::test]
async fn test_reads_use_call_without_transaction() {
    let wallet = Arc::new(ScriptedWallet::default());
    *wallet.call_result.lock() = Some(Ok(vec!["0x1".to_string(), "0x2".to_string()]));
    let exec = executor(wallet.clone(), Duration::from_secs(5));

    let outcome = exec
        .submit(Operation::GetGameState { session_id: 1 })
        .await
        .expect("read");
    assert_eq!(
        outcome,
        RawOutcome::CallResult(vec!["0x1".to_string(), "0x2".to_string()])
    );
    assert!(wallet.executed.lock().is_empty());
}

#[tokio::test]
async fn test_submit_score_encodes_record() {
    let wallet = Arc::new(
        ScriptedWallet::default()
            .submits("0x14")
            .receipt(Ok(Some(succeeded("0x14", json!([]))))),
    );
    let exec = executor(wallet.clone(), Duration::from_secs(5));
    let record = ScoreRecord::new(
        "0xacc0".to_string(),
        "Ada".to_string(),
        14_250,
        5,
        37.6,
        Difficulty::Medium,
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    );

    exec.submit_score(&record).await.expect("submit_score");

    let executed = wallet.executed.lock();
    assert_eq!(executed[0].entrypoint(), "submit_score");
    assert_eq!(
        executed[0].calldata(),
        &vec![
            "14250".to_string(),
            "5".to_string(),
            "38".to_string(),
            "2".to_string()
        ]
    );
}

#[tokio::test]
async fn test_submit_score_failure_is_sync_error() {
    let wallet = Arc::new(ScriptedWallet::default().rejects("no funds"));
    let exec = executor(wallet, Duration::from_secs(5));
    let record = ScoreRecord::new(
        "0xacc0".to_string(),
        "Ada".to_string(),
        100,
        9,
        300.0,
        Difficulty::Easy,
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    );
    assert!(exec.submit_score(&record).await.is_err());
}
