//! Execution and receipt-decoding error types.

use derive_more::{Display, Error};
use tracing::{error, instrument};

/// Reason an operation could not be executed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ExecutionErrorKind {
    /// The account refused the call before submission.
    #[display("account rejected the call: {_0}")]
    InvalidAccount(String),
    /// Submitted, but no receipt arrived within the wait budget.
    #[display("transaction {tx_hash} not confirmed after {waited_ms}ms")]
    ConfirmationTimeout {
        /// Hash of the submitted transaction.
        tx_hash: String,
        /// How long we waited.
        waited_ms: u64,
    },
    /// Any other provider or transport failure.
    #[display("provider error: {_0}")]
    ProviderError(String),
    /// Local contract violation, such as flipping a face-up tile.
    #[display("session state violation: {_0}")]
    SessionStateViolation(String),
}

/// Execution error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Execution error: {} at {}:{}", kind, file, line)]
pub struct ExecutionError {
    /// What went wrong.
    pub kind: ExecutionErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ExecutionError {
    /// Creates a new execution error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: ExecutionErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_kind = %kind, "Execution error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`ExecutionErrorKind::InvalidAccount`].
    #[track_caller]
    pub fn invalid_account(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::InvalidAccount(message.into()))
    }

    /// Shorthand for [`ExecutionErrorKind::ProviderError`].
    #[track_caller]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::ProviderError(message.into()))
    }

    /// Shorthand for [`ExecutionErrorKind::SessionStateViolation`].
    #[track_caller]
    pub fn state_violation(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::SessionStateViolation(message.into()))
    }

    /// Shorthand for [`ExecutionErrorKind::ConfirmationTimeout`].
    #[track_caller]
    pub fn confirmation_timeout(tx_hash: impl Into<String>, waited_ms: u64) -> Self {
        Self::new(ExecutionErrorKind::ConfirmationTimeout {
            tx_hash: tx_hash.into(),
            waited_ms,
        })
    }
}

/// Receipt or read result that could not be decoded.
#[derive(Debug, Clone, Display, Error)]
#[display("Malformed receipt: {} at {}:{}", message, file, line)]
pub struct ExtractError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ExtractError {
    /// Creates a new malformed-receipt error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Malformed receipt");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
