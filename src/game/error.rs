//! Deck and scoring error types.

use derive_more::{Display, Error};
use tracing::{error, instrument};

/// Reason a deck could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DeckErrorKind {
    /// Tier is unknown or not present in the tier table.
    #[display("invalid difficulty tier: {_0}")]
    InvalidTier(String),
}

/// Deck generation error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Deck error: {} at {}:{}", kind, file, line)]
pub struct DeckError {
    /// What went wrong.
    pub kind: DeckErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DeckError {
    /// Creates a new deck error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: DeckErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_kind = %kind, "Deck error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`DeckErrorKind::InvalidTier`].
    #[track_caller]
    pub fn invalid_tier(tier: impl Into<String>) -> Self {
        Self::new(DeckErrorKind::InvalidTier(tier.into()))
    }
}

/// Reason a scoring input was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ScoringErrorKind {
    /// Negative, non-finite or otherwise out-of-domain input.
    #[display("invalid scoring input: {_0}")]
    InvalidInput(String),
}

/// Scoring error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Scoring error: {} at {}:{}", kind, file, line)]
pub struct ScoringError {
    /// What went wrong.
    pub kind: ScoringErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ScoringError {
    /// Creates an [`ScoringErrorKind::InvalidInput`] error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let kind = ScoringErrorKind::InvalidInput(message.into());
        error!(error_kind = %kind, "Scoring error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
