//! Key-value persistence backends.

use std::collections::HashMap;
use std::fmt::Debug;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::store::StoreError;

/// String-keyed blob storage.
pub trait KeyValueStore: Send + Sync + Debug {
    /// Reads the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        debug!("Value stored");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }
}
