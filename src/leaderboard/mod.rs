//! Leaderboard commit, ranking, indexer reads and push updates.

mod error;
mod indexer;
mod models;
mod push;
mod ranking;
mod sync;

pub use error::{SyncError, SyncErrorKind};
pub use indexer::{IndexerClient, ToriiClient};
pub use models::{
    AccountOrder, EntrySource, LeaderboardEntry, LeaderboardStats, Page, PlayerProfile,
    PlayerStats, ScoreRecord, UserAccount,
};
pub use push::{BackoffPolicy, PushTransport, UpdateStream, WsPushTransport};
pub use ranking::{merge_entries, rank_entries};
pub use sync::{
    ACTIVE_WINDOW_HOURS, CommitReceipt, DEFAULT_CAPACITY, LeaderboardSync, RemoteStatus, ScoreSink,
};
