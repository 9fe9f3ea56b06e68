//! Leaderboard, profile and indexer record types.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::game::{Difficulty, PlayerId};

/// One finished session submitted to the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct ScoreRecord {
    /// Player identity.
    player_id: PlayerId,
    /// Name shown on the board.
    player_name: String,
    /// Final score.
    score: u64,
    /// Evaluated pair attempts.
    moves: u32,
    /// Seconds from start to completion.
    elapsed_seconds: f64,
    /// Difficulty tier played.
    difficulty: Difficulty,
    /// When the session completed.
    recorded_at: DateTime<Utc>,
}

impl ScoreRecord {
    /// Identity used when merging local and remote copies of a record.
    pub fn merge_key(&self) -> (PlayerId, i64) {
        (self.player_id.clone(), self.recorded_at.timestamp())
    }

    /// Display name of the difficulty era.
    pub fn era_name(&self) -> &'static str {
        self.difficulty.era_name()
    }
}

/// Where a leaderboard entry came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntrySource {
    /// Committed on this device.
    #[default]
    Local,
    /// Reported by the indexer.
    Remote,
}

/// Ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct LeaderboardEntry {
    /// 1-based position.
    rank: usize,
    /// Underlying record.
    record: ScoreRecord,
    /// Origin of the row.
    #[serde(default)]
    source: EntrySource,
}

impl LeaderboardEntry {
    pub(crate) fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

/// Aggregated per-player statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct PlayerProfile {
    /// Player identity.
    player_id: PlayerId,
    /// Name shown on the board.
    display_name: String,
    /// Highest score committed.
    best_score: u64,
    /// Mean of all committed scores.
    average_score: f64,
    /// Sessions committed.
    total_games: u32,
    /// Sessions completed.
    wins: u32,
    /// When the profile was created.
    created_at: DateTime<Utc>,
    /// Most recent commit.
    last_played: Option<DateTime<Utc>>,
}

impl PlayerProfile {
    /// Creates a profile with no games.
    pub fn new(player_id: PlayerId, display_name: String, created_at: DateTime<Utc>) -> Self {
        Self {
            player_id,
            display_name,
            best_score: 0,
            average_score: 0.0,
            total_games: 0,
            wins: 0,
            created_at,
            last_played: None,
        }
    }

    /// Folds one completed session into the aggregates.
    pub(crate) fn record(&mut self, score: u64, at: DateTime<Utc>) {
        let previous = f64::from(self.total_games);
        self.total_games += 1;
        self.wins += 1;
        self.best_score = self.best_score.max(score);
        self.average_score =
            (self.average_score * previous + score as f64) / f64::from(self.total_games);
        self.last_played = Some(at);
    }
}

/// Summary over the local leaderboard and profiles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Getters, new)]
pub struct LeaderboardStats {
    /// Profiles on record.
    total_players: usize,
    /// Games across all profiles.
    total_games: u64,
    /// Mean score of leaderboard entries.
    average_score: f64,
    /// Top leaderboard score.
    highest_score: u64,
}

/// Slice of a ranked listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct Page {
    /// Maximum rows.
    limit: usize,
    /// Rows to skip.
    offset: usize,
}

impl Page {
    /// The first `limit` rows.
    pub fn first(limit: usize) -> Self {
        Self::new(limit, 0)
    }
}

/// Sort key for account listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum AccountOrder {
    /// Newest accounts first.
    #[default]
    #[strum(serialize = "created_at_DESC")]
    Newest,
    /// Most recently active first.
    #[strum(serialize = "last_active_DESC")]
    RecentlyActive,
    /// Most games first.
    #[strum(serialize = "total_games_DESC")]
    MostGames,
}

/// Player account as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct UserAccount {
    /// Messaging-platform user id.
    telegram_id: String,
    /// On-ledger account address.
    account_address: Option<String>,
    /// Registration time.
    created_at: Option<DateTime<Utc>>,
    /// Last recorded activity.
    last_active: Option<DateTime<Utc>>,
    /// Games played.
    total_games: u64,
    /// Whether the account is enabled.
    is_active: bool,
}

/// Indexer-side aggregate for one player address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct PlayerStats {
    /// Player address.
    player: String,
    /// Games played.
    total_games: u64,
    /// Games won.
    total_wins: u64,
    /// Highest score.
    best_score: u64,
    /// Fastest completion in seconds.
    best_time: u64,
    /// Moves over all games.
    total_moves: u64,
    /// Mean score.
    average_score: f64,
}
