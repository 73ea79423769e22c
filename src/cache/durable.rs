//! Durable backing store boundary
//!
//! The cache mirrors entries into a `DurableStore` so they survive a restart.
//! Stores are treated as unreliable: every operation returns a `Result`, and
//! the cache decides explicitly what each failure means (a miss on read, a
//! lost mirror on write).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors reported by a durable store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The store is disabled or cannot be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The write would exceed the store's capacity
    #[error("Storage quota exceeded writing '{0}'")]
    QuotaExceeded(String),
}

/// Persistent string key/value storage shared with other users of the store
pub trait DurableStore: Send + Sync + fmt::Debug {
    /// Reads the value stored under `key`, `Ok(None)` if there is none
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key in the store, including keys the cache does not own
    fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process durable store
///
/// Clones share the same map, so a cache built over a clone sees what an
/// earlier cache wrote, just like a fresh process reading the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total size of stored keys and values, like browser storage
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total bytes of keys and values currently stored
    pub fn used_bytes(&self) -> usize {
        self.entries()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();

        if let Some(quota) = self.quota_bytes {
            let replaced = entries.get(key).map_or(0, |old| key.len() + old.len());
            let used: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
            if used - replaced + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded(key.to_string()));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries().keys().cloned().collect())
    }
}
