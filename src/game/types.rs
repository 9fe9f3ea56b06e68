//! Core domain types for the matching game.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::Display;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};
use tracing::{debug, instrument};

use crate::game::DeckError;

/// Ledger-assigned identifier of a game session.
pub type SessionId = u64;

/// Identifier of a player (chat user id or account address).
pub type PlayerId = String;

/// Symbols tile values are drawn from.
pub const TILE_ALPHABET: [&str; 24] = [
    "🎮", "🕹️", "⚡", "👾", "🎯", "🎲", "🎪", "🎨", "🎭", "🎬", "🎸", "🎹", "🎺", "🎻", "🥁", "🎤",
    "🏆", "🏅", "⭐", "💎", "👑", "🔥", "💫", "✨",
];

/// Difficulty tier of a session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    /// Four pairs.
    Easy,
    /// Eight pairs.
    Medium,
    /// Twelve pairs.
    Hard,
}

impl Difficulty {
    /// Wire code used in contract calldata.
    pub fn code(self) -> u64 {
        match self {
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] with `InvalidTier` for unknown codes.
    #[instrument]
    pub fn from_code(code: u64) -> Result<Self, DeckError> {
        match code {
            1 => Ok(Self::Easy),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Hard),
            other => Err(DeckError::invalid_tier(format!("code {other}"))),
        }
    }

    /// Themed name shown on leaderboards.
    pub fn era_name(self) -> &'static str {
        match self {
            Self::Easy => "Ancient Era",
            Self::Medium => "Medieval Times",
            Self::Hard => "Modern Era",
        }
    }
}

/// Per-tier parameters.
#[derive(Debug, Clone, Copy, PartialEq, Getters, new)]
pub struct TierSpec {
    /// Number of tile pairs on the board.
    pair_count: usize,
    /// Multiplier applied to the raw score.
    multiplier: f64,
}

/// Configuration table mapping tiers to their parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: BTreeMap<Difficulty, TierSpec>,
}

impl TierTable {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            tiers: BTreeMap::new(),
        }
    }

    /// The standard 4/8/12 pair table.
    pub fn standard() -> Self {
        Self::empty()
            .with_tier(Difficulty::Easy, TierSpec::new(4, 10.0))
            .with_tier(Difficulty::Medium, TierSpec::new(8, 15.0))
            .with_tier(Difficulty::Hard, TierSpec::new(12, 20.0))
    }

    /// Adds or replaces a tier.
    pub fn with_tier(mut self, tier: Difficulty, spec: TierSpec) -> Self {
        self.tiers.insert(tier, spec);
        self
    }

    /// Looks up a tier.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] with `InvalidTier` if the tier is not configured.
    pub fn spec(&self, tier: Difficulty) -> Result<TierSpec, DeckError> {
        self.tiers
            .get(&tier)
            .copied()
            .ok_or_else(|| DeckError::invalid_tier(tier.to_string()))
    }

    /// Pair count of a tier.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] with `InvalidTier` if the tier is not configured.
    pub fn pair_count(&self, tier: Difficulty) -> Result<usize, DeckError> {
        Ok(*self.spec(tier)?.pair_count())
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Value printed on a tile, an index into [`TILE_ALPHABET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileValue(u8);

impl TileValue {
    /// Wraps a raw value.
    pub fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Display symbol for this value.
    pub fn symbol(self) -> &'static str {
        TILE_ALPHABET[self.0 as usize % TILE_ALPHABET.len()]
    }
}

/// One tile on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    index: usize,
    value: TileValue,
    matched: bool,
}

impl Tile {
    /// Creates an unmatched tile.
    pub fn new(index: usize, value: TileValue) -> Self {
        Self {
            index,
            value,
            matched: false,
        }
    }

    /// Stable board position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Tile value.
    pub fn value(&self) -> TileValue {
        self.value
    }

    /// Whether the tile has been matched.
    pub fn is_matched(&self) -> bool {
        self.matched
    }

    pub(crate) fn with_matched(mut self, matched: bool) -> Self {
        self.matched = matched;
        self
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum SessionStatus {
    /// Being played.
    Active,
    /// All pairs matched.
    Completed,
    /// Given up by the player.
    Abandoned,
}

impl SessionStatus {
    /// Wire code reported by `get_game`.
    pub fn code(self) -> u64 {
        match self {
            Self::Active => 0,
            Self::Completed => 1,
            Self::Abandoned => 2,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Active),
            1 => Some(Self::Completed),
            2 => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// Why a tile cannot be revealed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RevealBlock {
    /// Session is not active.
    #[display("session is not active")]
    NotActive,
    /// Index outside the board.
    #[display("tile index out of range")]
    OutOfRange,
    /// Tile is already face-up.
    #[display("tile is already face-up")]
    AlreadyFaceUp,
    /// Tile is already matched.
    #[display("tile is already matched")]
    AlreadyMatched,
    /// Two tiles are already awaiting evaluation.
    #[display("a pair is already pending")]
    PairPending,
}

/// State of one play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct GameSession {
    /// Ledger-assigned session id.
    id: SessionId,
    /// Owning player.
    player_id: PlayerId,
    /// Difficulty tier.
    difficulty: Difficulty,
    /// Board in position order.
    tiles: Vec<Tile>,
    /// Face-up, not yet evaluated tile indices.
    face_up: Vec<usize>,
    /// Pairs matched so far.
    matched_pairs: usize,
    /// Pairs on the board.
    total_pairs: usize,
    /// Evaluated pair attempts.
    moves: u32,
    /// Running score.
    score: u64,
    /// When play started.
    started_at: DateTime<Utc>,
    /// When the last pair was matched.
    completed_at: Option<DateTime<Utc>>,
    /// Lifecycle status.
    status: SessionStatus,
}

impl GameSession {
    /// Creates a fresh active session over `tiles`.
    #[instrument(skip(tiles), fields(session_id = id, tiles = tiles.len()))]
    pub fn new(
        id: SessionId,
        player_id: PlayerId,
        difficulty: Difficulty,
        tiles: Vec<Tile>,
        started_at: DateTime<Utc>,
    ) -> Self {
        debug!("Creating game session");
        let total_pairs = tiles.len() / 2;
        Self {
            id,
            player_id,
            difficulty,
            tiles,
            face_up: Vec::new(),
            matched_pairs: 0,
            total_pairs,
            moves: 0,
            score: 0,
            started_at,
            completed_at: None,
            status: SessionStatus::Active,
        }
    }

    /// Rebuilds a session from a ledger snapshot.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: SessionId,
        player_id: PlayerId,
        difficulty: Difficulty,
        tiles: Vec<Tile>,
        face_up: Vec<usize>,
        matched_pairs: usize,
        total_pairs: usize,
        moves: u32,
        score: u64,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        status: SessionStatus,
    ) -> Self {
        Self {
            id,
            player_id,
            difficulty,
            tiles,
            face_up,
            matched_pairs,
            total_pairs,
            moves,
            score,
            started_at,
            completed_at,
            status,
        }
    }

    /// Checks whether `index` may be revealed.
    pub fn reveal_block(&self, index: usize) -> Option<RevealBlock> {
        let tile = match self.tiles.get(index) {
            Some(t) => t,
            None => return Some(RevealBlock::OutOfRange),
        };
        if self.status != SessionStatus::Active {
            Some(RevealBlock::NotActive)
        } else if self.face_up.contains(&index) {
            Some(RevealBlock::AlreadyFaceUp)
        } else if tile.is_matched() {
            Some(RevealBlock::AlreadyMatched)
        } else if self.face_up.len() >= 2 {
            Some(RevealBlock::PairPending)
        } else {
            None
        }
    }

    /// Whether two tiles are face-up and awaiting evaluation.
    pub fn pair_pending(&self) -> bool {
        self.face_up.len() == 2
    }

    /// Whether the face-up pair shows the same value.
    pub fn pending_pair_matches(&self) -> Option<bool> {
        match self.face_up.as_slice() {
            [a, b] => Some(self.tiles[*a].value() == self.tiles[*b].value()),
            _ => None,
        }
    }

    /// Whether every pair is matched.
    pub fn all_matched(&self) -> bool {
        self.matched_pairs == self.total_pairs
    }

    pub(crate) fn reveal(&mut self, index: usize) {
        self.face_up.push(index);
    }

    /// Marks the face-up pair matched and counts the move.
    pub(crate) fn resolve_match(&mut self) -> [usize; 2] {
        let pair = [self.face_up[0], self.face_up[1]];
        for index in pair {
            self.tiles[index] = self.tiles[index].with_matched(true);
        }
        self.face_up.clear();
        self.matched_pairs += 1;
        self.moves += 1;
        pair
    }

    /// Turns the face-up pair back over and counts the move.
    pub(crate) fn resolve_mismatch(&mut self) -> Vec<usize> {
        self.moves += 1;
        std::mem::take(&mut self.face_up)
    }

    pub(crate) fn set_score(&mut self, score: u64) {
        self.score = score;
    }

    pub(crate) fn stamp_started(&mut self, at: DateTime<Utc>) {
        self.started_at = at;
    }

    pub(crate) fn complete(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
        self.status = SessionStatus::Completed;
    }

    pub(crate) fn abandon(&mut self) {
        self.face_up.clear();
        self.status = SessionStatus::Abandoned;
    }

    /// Seconds between start and `now` (or completion), never negative.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        let end = self.completed_at.unwrap_or(now);
        let millis = (end - self.started_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }
}
