//! Persistence error types.

use derive_more::{Display, Error};
use tracing::{error, instrument};

/// Reason a persistence operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StoreErrorKind {
    /// The backing database failed.
    #[display("backend failure: {_0}")]
    Backend(String),
    /// A stored value is not a valid record envelope.
    #[display("corrupt value under {key}: {reason}")]
    Corrupt {
        /// Storage key.
        key: String,
        /// Parse failure.
        reason: String,
    },
    /// The envelope was written by an unknown format version.
    #[display("unsupported record version {found} under {key}")]
    UnsupportedVersion {
        /// Storage key.
        key: String,
        /// Version found in the envelope.
        found: u32,
    },
}

/// Persistence error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", kind, file, line)]
pub struct StoreError {
    /// What went wrong.
    pub kind: StoreErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: StoreErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_kind = %kind, "Store error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`StoreErrorKind::Backend`].
    #[track_caller]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Backend(message.into()))
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::backend(format!("Diesel error: {}", err))
    }
}

impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::backend(format!("Connection error: {}", err))
    }
}
