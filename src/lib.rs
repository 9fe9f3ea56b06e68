//! Memorabilia session engine
//!
//! Engine behind a tile-matching memory game whose sessions run either in
//! process or against a remote contract, with a local-first leaderboard that
//! converges with a remote indexer.
//!
//! # Architecture
//!
//! - **Game**: board model, deck generation and scoring
//! - **Ledger**: execution backends (local simulator, remote executor) and
//!   receipt decoding
//! - **Session**: the lifecycle state machine driving one session at a time
//! - **Leaderboard**: local commit and ranking, indexer reads, push updates
//! - **Store**: versioned local persistence (in-memory or SQLite)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use memorabilia::{
//!     DeckGenerator, Difficulty, LocalSimulator, PlayerIdentity, ScoringEngine,
//!     SessionController, SessionTiming, SystemClock, TierTable,
//! };
//!
//! # async fn example() -> Result<(), memorabilia::SessionError> {
//! let clock = Arc::new(SystemClock);
//! let scoring = ScoringEngine::new(TierTable::standard());
//! let simulator = LocalSimulator::new(
//!     "player-1".to_string(),
//!     DeckGenerator::new(TierTable::standard()),
//!     scoring.clone(),
//!     clock.clone(),
//! );
//! let controller = SessionController::new(
//!     Arc::new(simulator),
//!     scoring,
//!     PlayerIdentity::new("player-1".to_string(), "Ada".to_string()),
//!     SessionTiming::default(),
//!     clock,
//! );
//! controller.start_session(Difficulty::Easy).await?;
//! controller.wait_for_preview().await;
//! let outcome = controller.flip(0).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod clock;
mod config;
mod game;
mod leaderboard;
mod ledger;
mod session;
mod store;

// Crate-level exports - Clock
pub use clock::{Clock, FixedClock, SystemClock};

// Crate-level exports - Configuration
pub use config::{
    ConfigError, ENV_MODE, ENV_RPC_URL, ENV_TORII_URL, ENV_WORLD_ADDRESS, EngineConfig,
};

// Crate-level exports - Game model
pub use game::{
    DeckError, DeckErrorKind, DeckGenerator, Difficulty, GameSession, Grade, PlayerId, Rating,
    RevealBlock, ScoringEngine, ScoringError, ScoringErrorKind, ScoringRules, SessionId,
    SessionStatus, Stars, TILE_ALPHABET, TierSpec, TierTable, Tile, TileValue,
};

// Crate-level exports - Ledger
pub use ledger::{
    ConfirmationPolicy, ContractCall, DomainEvent, EmittedEvent, ExecutionError,
    ExecutionErrorKind, ExecutionMode, ExtractError, LedgerBridge, LocalSimulator, Operation,
    ParsedReceipt, RawOutcome, RawReceipt, ReceiptEventExtractor, ReceiptSchema, RemoteExecutor,
    WalletError, WalletProvider, encode_scalar, entrypoints, parse_scalar,
};

// Crate-level exports - Session
pub use session::{
    CompletionSummary, ControllerState, FlipOutcome, IgnoreReason, PlayerIdentity,
    SessionController, SessionError, SessionErrorKind, SessionTiming,
};

// Crate-level exports - Leaderboard
pub use leaderboard::{
    ACTIVE_WINDOW_HOURS, AccountOrder, BackoffPolicy, CommitReceipt, DEFAULT_CAPACITY,
    EntrySource, IndexerClient, LeaderboardEntry, LeaderboardStats, LeaderboardSync, Page,
    PlayerProfile, PlayerStats, PushTransport, RemoteStatus, ScoreRecord, ScoreSink, SyncError,
    SyncErrorKind, ToriiClient, UpdateStream, UserAccount, WsPushTransport, merge_entries,
    rank_entries,
};

// Crate-level exports - Persistence
pub use store::{
    KeyValueStore, LEADERBOARD_KEY, MemoryStore, PLAYER_DATA_KEY, RECORD_VERSION, RecordStore,
    SqliteStore, StoreError, StoreErrorKind,
};
