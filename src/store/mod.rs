//! Local persistence for profiles and the offline leaderboard.

mod error;
mod kv;
mod records;
mod schema; // Diesel generated schema - internal use only
mod sqlite;

pub use error::{StoreError, StoreErrorKind};
pub use kv::{KeyValueStore, MemoryStore};
pub use records::{LEADERBOARD_KEY, PLAYER_DATA_KEY, RECORD_VERSION, RecordStore};
pub use sqlite::SqliteStore;
