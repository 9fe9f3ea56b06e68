//! Session verbs and their contract-call encoding.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::game::{Difficulty, SessionId};

/// Contract entrypoint names.
pub mod entrypoints {
    /// Creates a session.
    pub const START_GAME: &str = "start_game";
    /// Reveals one tile.
    pub const FLIP_CARD: &str = "flip_card";
    /// Evaluates the face-up pair.
    pub const CHECK_MATCH: &str = "check_match";
    /// Gives up a session.
    pub const ABANDON_GAME: &str = "abandon_game";
    /// Reads a session.
    pub const GET_GAME: &str = "get_game";
    /// Records a finished score on the leaderboard system.
    pub const SUBMIT_SCORE: &str = "submit_score";
}

/// Encodes an integer as a decimal calldata scalar.
pub fn encode_scalar(value: u64) -> String {
    value.to_string()
}

/// Parses a scalar returned by the ledger, `0x` hex or decimal.
pub fn parse_scalar(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if hex.is_empty() => None,
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// One session verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a session at the given tier.
    StartGame {
        /// Requested tier.
        difficulty: Difficulty,
    },
    /// Reveal one tile.
    FlipCard {
        /// Target session.
        session_id: SessionId,
        /// Board position.
        tile_index: usize,
    },
    /// Evaluate the face-up pair.
    CheckMatch {
        /// Target session.
        session_id: SessionId,
    },
    /// Give up the session.
    AbandonGame {
        /// Target session.
        session_id: SessionId,
    },
    /// Read the session state.
    GetGameState {
        /// Target session.
        session_id: SessionId,
    },
}

impl Operation {
    /// Contract entrypoint for this verb.
    pub fn entrypoint(&self) -> &'static str {
        match self {
            Self::StartGame { .. } => entrypoints::START_GAME,
            Self::FlipCard { .. } => entrypoints::FLIP_CARD,
            Self::CheckMatch { .. } => entrypoints::CHECK_MATCH,
            Self::AbandonGame { .. } => entrypoints::ABANDON_GAME,
            Self::GetGameState { .. } => entrypoints::GET_GAME,
        }
    }

    /// Ordered decimal calldata.
    pub fn calldata(&self) -> Vec<String> {
        match *self {
            Self::StartGame { difficulty } => vec![encode_scalar(difficulty.code())],
            Self::FlipCard {
                session_id,
                tile_index,
            } => vec![encode_scalar(session_id), encode_scalar(tile_index as u64)],
            Self::CheckMatch { session_id }
            | Self::AbandonGame { session_id }
            | Self::GetGameState { session_id } => vec![encode_scalar(session_id)],
        }
    }

    /// Whether this verb only reads ledger state.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::GetGameState { .. })
    }

    /// Session targeted by this verb, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match *self {
            Self::StartGame { .. } => None,
            Self::FlipCard { session_id, .. }
            | Self::CheckMatch { session_id }
            | Self::AbandonGame { session_id }
            | Self::GetGameState { session_id } => Some(session_id),
        }
    }

    /// Builds the contract call against `contract_address`.
    pub fn to_call(&self, contract_address: &str) -> ContractCall {
        ContractCall::new(
            contract_address.to_string(),
            self.entrypoint().to_string(),
            self.calldata(),
        )
    }
}

/// A contract invocation ready for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct ContractCall {
    /// Target contract.
    contract_address: String,
    /// Entrypoint name.
    entrypoint: String,
    /// Ordered decimal scalars.
    calldata: Vec<String>,
}
