//! Two-layer read-through cache
//!
//! Provides `ReadThroughCache`, which keeps entries in a process-local map and
//! mirrors them into an optional `DurableStore`, reporting staleness instead of
//! dropping expired data.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::durable::DurableStore;
use super::entry::{CacheEntry, CachedData};
use super::file_store::FileStore;

/// Entries as held in both layers; payloads stay untyped until read
type StoredEntry = CacheEntry<Value>;

/// Read-through cache over a memory layer and an optional durable store
///
/// Lookups check memory first, then the durable store, promoting durable hits
/// into memory. Writes land in memory unconditionally and are mirrored to the
/// durable store on a best-effort basis. No operation returns an error: store
/// failures and corrupt records degrade to cache misses.
///
/// Build one instance at startup and share it (e.g. behind an `Arc`).
#[derive(Debug)]
pub struct ReadThroughCache {
    /// Process-local layer, authoritative for this process
    memory: RwLock<HashMap<String, StoredEntry>>,
    /// Mirror that survives restarts
    durable: Option<Box<dyn DurableStore>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl Default for ReadThroughCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ReadThroughCache {
    /// Creates a memory-only cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            durable: None,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Creates a cache mirrored to the XDG cache directory
    ///
    /// Falls back to a memory-only cache when no cache directory can be
    /// determined.
    pub fn with_default_store(config: CacheConfig) -> Self {
        match FileStore::new() {
            Some(store) => Self::new(config).with_durable(store),
            None => {
                warn!("no cache directory available; entries will not survive restarts");
                Self::new(config)
            }
        }
    }

    /// Mirrors entries into `store`.
    pub fn with_durable(mut self, store: impl DurableStore + 'static) -> Self {
        self.durable = Some(Box::new(store));
        self
    }

    /// Uses `clock` for stamping and staleness checks.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Reads `key`, reporting whether the value is stale
    ///
    /// Returns `CachedData::miss()` when neither layer holds a usable entry,
    /// including when the stored payload does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CachedData<T> {
        let now = self.clock.now();
        self.lookup(key, |entry| match T::deserialize(&entry.value) {
            Ok(value) => CachedData {
                value: Some(value),
                is_stale: entry.is_stale_at(now),
            },
            Err(e) => {
                debug!(key, error = %e, "cached value has unexpected shape; treating as miss");
                CachedData::miss()
            }
        })
        .unwrap_or_else(CachedData::miss)
    }

    /// Reads `key` together with its timestamps
    pub fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        self.lookup(key, |entry| {
            T::deserialize(&entry.value).ok().map(|value| CacheEntry {
                value,
                written_at: entry.written_at,
                expires_at: entry.expires_at,
            })
        })
        .flatten()
    }

    /// Stores `value` under `key` with the configured default TTL
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Stores `value` under `key`, going stale after `ttl`
    ///
    /// Replaces any previous entry. A value that fails to serialize is not
    /// cached and leaves the previous entry in place.
    pub fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "value is not serializable; not caching");
                return;
            }
        };

        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        let record = serde_json::to_string(&entry);
        self.memory_write().insert(key.to_string(), entry);

        let Some(store) = &self.durable else {
            return;
        };
        let result = record
            .map_err(|e| e.to_string())
            .and_then(|json| {
                store
                    .write(&self.durable_key(key), &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(key, error = %e, "durable write failed; entry kept in memory only");
        }
    }

    /// Removes `key` from both layers. Missing keys are ignored.
    pub fn evict(&self, key: &str) {
        self.memory_write().remove(key);

        if let Some(store) = &self.durable {
            if let Err(e) = store.remove(&self.durable_key(key)) {
                warn!(key, error = %e, "failed to remove durable entry");
            }
        }
    }

    /// Removes every entry this cache owns from both layers
    ///
    /// Durable keys outside the configured namespace are left untouched.
    pub fn evict_all(&self) {
        self.memory_write().clear();

        let Some(store) = &self.durable else {
            return;
        };
        let keys = match store.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list durable entries; durable layer not cleared");
                return;
            }
        };

        for durable_key in keys
            .iter()
            .filter(|k| self.config.owned_key(k).is_some())
        {
            if let Err(e) = store.remove(durable_key) {
                warn!(key = %durable_key, error = %e, "failed to remove durable entry");
            }
        }
    }

    /// Keys currently held in the memory layer, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.memory_read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Cache keys present in the durable store, sorted
    ///
    /// Only keys in this cache's namespace are listed, with the namespace
    /// stripped. Returns an empty list when the store is absent or failing.
    pub fn durable_keys(&self) -> Vec<String> {
        let Some(store) = &self.durable else {
            return Vec::new();
        };
        match store.list_keys() {
            Ok(keys) => {
                let mut keys: Vec<String> = keys
                    .iter()
                    .filter_map(|k| self.config.owned_key(k))
                    .map(str::to_string)
                    .collect();
                keys.sort();
                keys
            }
            Err(e) => {
                warn!(error = %e, "failed to list durable entries");
                Vec::new()
            }
        }
    }

    /// Runs `f` on the entry for `key`, loading it from the durable store into
    /// memory if needed
    fn lookup<R>(&self, key: &str, f: impl FnOnce(&StoredEntry) -> R) -> Option<R> {
        if let Some(entry) = self.memory_read().get(key) {
            trace!(key, "memory hit");
            return Some(f(entry));
        }

        let loaded = self.load_durable(key)?;
        trace!(key, "durable hit; promoting to memory");
        let mut memory = self.memory_write();
        // A concurrent set may have landed since the durable read; keep it.
        let entry = memory.entry(key.to_string()).or_insert(loaded);
        Some(f(entry))
    }

    fn load_durable(&self, key: &str) -> Option<StoredEntry> {
        let store = self.durable.as_ref()?;

        let raw = match store.read(&self.durable_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "durable read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<StoredEntry>(&raw) {
            Ok(entry) if entry.is_well_formed() => Some(entry),
            Ok(_) => {
                warn!(key, "durable entry expires before it was written; treating as miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "durable entry is corrupt; treating as miss");
                None
            }
        }
    }

    fn durable_key(&self, key: &str) -> String {
        self.config.durable_key(key)
    }

    fn memory_read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredEntry>> {
        self.memory.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn memory_write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredEntry>> {
        self.memory.write().unwrap_or_else(PoisonError::into_inner)
    }
}
