//! Board model, deck generation and scoring.

mod deck;
mod error;
mod scoring;
mod types;

pub use deck::DeckGenerator;
pub use error::{DeckError, DeckErrorKind, ScoringError, ScoringErrorKind};
pub use scoring::{Grade, Rating, ScoringEngine, ScoringRules, Stars};
pub use types::{
    Difficulty, GameSession, PlayerId, RevealBlock, SessionId, SessionStatus, TILE_ALPHABET,
    TierSpec, TierTable, Tile, TileValue,
};
