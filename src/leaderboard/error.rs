//! Leaderboard synchronization error types.

use derive_more::{Display, Error};
use tracing::{error, instrument};

use crate::store::StoreError;

/// Reason a leaderboard operation failed.
#[derive(Debug, Clone, Display)]
pub enum SyncErrorKind {
    /// The indexer or push endpoint could not be reached.
    #[display("indexer unreachable: {_0}")]
    IndexerUnreachable(String),
    /// The indexer answered with errors or an unexpected shape.
    #[display("indexer response rejected: {_0}")]
    IndexerResponse(String),
    /// Local persistence failed.
    #[display("{_0}")]
    Store(StoreError),
    /// Remote score submission failed.
    #[display("remote submission failed: {_0}")]
    RemoteSubmission(String),
    /// The requested remote capability was not configured.
    #[display("{_0} is not configured")]
    NotConfigured(&'static str),
}

/// Leaderboard error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Sync error: {} at {}:{}", kind, file, line)]
pub struct SyncError {
    /// What went wrong.
    pub kind: SyncErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SyncError {
    /// Creates a new sync error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: SyncErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_kind = %kind, "Sync error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`SyncErrorKind::IndexerUnreachable`].
    #[track_caller]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::IndexerUnreachable(message.into()))
    }

    /// Shorthand for [`SyncErrorKind::IndexerResponse`].
    #[track_caller]
    pub fn response(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::IndexerResponse(message.into()))
    }

    /// Shorthand for [`SyncErrorKind::RemoteSubmission`].
    #[track_caller]
    pub fn remote_submission(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::RemoteSubmission(message.into()))
    }

    /// Shorthand for [`SyncErrorKind::NotConfigured`].
    #[track_caller]
    pub fn not_configured(what: &'static str) -> Self {
        Self::new(SyncErrorKind::NotConfigured(what))
    }

    /// Whether the failure is a transport problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, SyncErrorKind::IndexerUnreachable(_))
    }
}

impl From<StoreError> for SyncError {
    #[track_caller]
    fn from(err: StoreError) -> Self {
        Self::new(SyncErrorKind::Store(err))
    }
}

impl From<reqwest::Error> for SyncError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::unreachable(format!("HTTP error: {}", err))
    }
}
