//! Versioned record collections on top of a [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::store::{KeyValueStore, StoreError, StoreErrorKind};

/// Key of the player-profile collection.
pub const PLAYER_DATA_KEY: &str = "memorabilia_player_data";

/// Key of the local leaderboard collection.
pub const LEADERBOARD_KEY: &str = "memorabilia_leaderboard";

/// Envelope format written by this version.
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    version: u32,
    records: Vec<T>,
}

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    records: &'a [T],
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Record collections with per-key read-modify-write serialization.
#[derive(Debug, Clone)]
pub struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RecordStore {
    /// Wraps a key-value backend.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Loads the collection under `key`; a missing key is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails, the value is corrupt, or
    /// the envelope version is unknown.
    #[instrument(skip(self))]
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        self.read(key)
    }

    /// Replaces the collection under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the backend fails.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub fn save<T: Serialize>(&self, key: &str, records: &[T]) -> Result<(), StoreError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        self.write(key, records)
    }

    /// Applies `f` to the collection under `key` and writes the result back.
    ///
    /// Concurrent updates of the same key run one after another.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if loading or saving fails.
    #[instrument(skip(self, f))]
    pub fn update<T, R, F>(&self, key: &str, f: F) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        let mut records = self.read(key)?;
        let result = f(&mut records);
        self.write(key, &records)?;
        Ok(result)
    }

    /// Deletes the collection under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    #[instrument(skip(self))]
    pub fn clear(&self, key: &str) -> Result<(), StoreError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock();
        self.kv.remove(key)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let Some(raw) = self.kv.get(key)? else {
            debug!("No records stored");
            return Ok(Vec::new());
        };
        let corrupt = |e: serde_json::Error| {
            StoreError::new(StoreErrorKind::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
        };

        let probe: VersionProbe = serde_json::from_str(&raw).map_err(corrupt)?;
        if probe.version != RECORD_VERSION {
            warn!(found = probe.version, "Unknown record version");
            return Err(StoreError::new(StoreErrorKind::UnsupportedVersion {
                key: key.to_string(),
                found: probe.version,
            }));
        }
        let envelope: Envelope<T> = serde_json::from_str(&raw).map_err(corrupt)?;
        debug!(version = envelope.version, count = envelope.records.len(), "Records loaded");
        Ok(envelope.records)
    }

    fn write<T: Serialize>(&self, key: &str, records: &[T]) -> Result<(), StoreError> {
        let envelope = EnvelopeRef {
            version: RECORD_VERSION,
            records,
        };
        let raw = serde_json::to_string(&envelope).map_err(|e| {
            StoreError::new(StoreErrorKind::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })?;
        self.kv.set(key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn missing_key_is_empty() {
        let store = RecordStore::new(Arc::new(MemoryStore::new()));
        let records: Vec<u32> = store.load("nothing").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("k", r#"{"version":9,"records":[]}"#).unwrap();
        let store = RecordStore::new(kv);
        let err = store.load::<u32>("k").unwrap_err();
        assert!(matches!(
            err.kind,
            StoreErrorKind::UnsupportedVersion { found: 9, .. }
        ));
    }

    #[test]
    fn bare_array_is_corrupt() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("k", "[1,2,3]").unwrap();
        let store = RecordStore::new(kv);
        let err = store.load::<u32>("k").unwrap_err();
        assert!(matches!(err.kind, StoreErrorKind::Corrupt { .. }));
    }
}
