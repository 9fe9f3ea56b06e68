//! Session controller error types.

use derive_more::{Display, Error};
use tracing::{error, instrument};

use crate::game::{ScoringError, SessionId};
use crate::ledger::{DomainEvent, ExecutionError, ExtractError};

/// Reason a session operation failed.
#[derive(Debug, Clone, Display)]
pub enum SessionErrorKind {
    /// The ledger bridge failed; the session was rolled back.
    #[display("{_0}")]
    Execution(ExecutionError),
    /// A ledger outcome could not be decoded; the session was rolled back.
    #[display("{_0}")]
    Extract(ExtractError),
    /// Scoring rejected the session's inputs.
    #[display("{_0}")]
    Scoring(ScoringError),
    /// A session is already starting or being played.
    #[display("session {_0:?} is still in progress")]
    SessionInProgress(Option<SessionId>),
    /// An abandon or reset overtook this start.
    #[display("session start was superseded")]
    Superseded,
    /// The tile index is not on the board.
    #[display("tile {index} is outside a board of {len}")]
    TileOutOfRange {
        /// Requested position.
        index: usize,
        /// Board size.
        len: usize,
    },
    /// The ledger answered with an event that does not fit the request.
    #[display("unexpected {event:?} in response to {operation}")]
    UnexpectedEvent {
        /// Entrypoint that was submitted.
        operation: &'static str,
        /// Event the ledger reported.
        event: DomainEvent,
    },
}

/// Session error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Session error: {} at {}:{}", kind, file, line)]
pub struct SessionError {
    /// What went wrong.
    pub kind: SessionErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: SessionErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_kind = %kind, "Session error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Whether the failure came from the ledger bridge.
    pub fn is_execution(&self) -> bool {
        matches!(self.kind, SessionErrorKind::Execution(_))
    }
}

impl From<ExecutionError> for SessionError {
    #[track_caller]
    fn from(err: ExecutionError) -> Self {
        Self::new(SessionErrorKind::Execution(err))
    }
}

impl From<ExtractError> for SessionError {
    #[track_caller]
    fn from(err: ExtractError) -> Self {
        Self::new(SessionErrorKind::Extract(err))
    }
}

impl From<ScoringError> for SessionError {
    #[track_caller]
    fn from(err: ScoringError) -> Self {
        Self::new(SessionErrorKind::Scoring(err))
    }
}
