//! Stale-while-revalidate refresh on top of the read-through cache
//!
//! The cache itself only reports staleness. `RefreshCoordinator` decides when
//! to refetch, serves stale data while a background refresh runs, and makes
//! sure at most one refresh per key is in flight. Progress is published to
//! subscribers over a broadcast channel.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::ReadThroughCache;

/// Capacity of the event channel; slow subscribers miss older events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Messages published as refreshes progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// A fetch for the key began
    Started { key: String },
    /// The fetch succeeded and the cache holds the new value
    Completed { key: String },
    /// The fetch failed; any previous entry is kept
    Failed { key: String, error: String },
    /// A refresh was requested while another was in flight for the key
    Skipped { key: String },
}

impl RefreshEvent {
    /// The cache key the event is about
    pub fn key(&self) -> &str {
        match self {
            Self::Started { key }
            | Self::Completed { key }
            | Self::Failed { key, .. }
            | Self::Skipped { key } => key,
        }
    }
}

/// Refresh state of a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Marks a key as refreshing until dropped
#[derive(Debug)]
pub struct RefreshGuard {
    key: String,
    inflight: Arc<Mutex<HashSet<String>>>,
}

impl RefreshGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Serves cached values and keeps them fresh, one refresh per key at a time
///
/// Clones share the cache, the in-flight set and the event channel.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    cache: Arc<ReadThroughCache>,
    inflight: Arc<Mutex<HashSet<String>>>,
    events: broadcast::Sender<RefreshEvent>,
}

impl RefreshCoordinator {
    /// Creates a coordinator over a shared cache
    pub fn new(cache: Arc<ReadThroughCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            cache,
            inflight: Arc::new(Mutex::new(HashSet::new())),
            events,
        }
    }

    /// The underlying cache
    pub fn cache(&self) -> &Arc<ReadThroughCache> {
        &self.cache
    }

    /// Receives events for refreshes started after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    /// Whether a refresh is currently in flight for `key`
    pub fn state(&self, key: &str) -> RefreshState {
        if self.inflight().contains(key) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Marks `key` as refreshing
    ///
    /// Returns `None` if a refresh is already in flight. The key returns to
    /// idle when the guard is dropped.
    pub fn try_begin(&self, key: &str) -> Option<RefreshGuard> {
        if !self.inflight().insert(key.to_string()) {
            return None;
        }
        Some(RefreshGuard {
            key: key.to_string(),
            inflight: Arc::clone(&self.inflight),
        })
    }

    /// Returns the value for `key`, fetching only when needed
    ///
    /// - fresh hit: returns the cached value
    /// - stale hit: returns the stale value and refreshes in the background,
    ///   unless a refresh for the key is already running
    /// - miss: awaits `fetcher`, caches the result and returns it; a fetch
    ///   error is returned to the caller
    pub async fn fetch<T, F, Fut, E>(&self, key: &str, fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let cached = self.cache.get::<T>(key);
        match cached.value {
            Some(value) if !cached.is_stale => Ok(value),
            Some(value) => {
                self.spawn_refresh(key, fetcher);
                Ok(value)
            }
            None => {
                // Hold the key so stale reads elsewhere don't start a duplicate
                // background refresh; fetch regardless since there is nothing to serve.
                let _guard = self.try_begin(key);
                let value = fetcher().await?;
                self.cache.set(key, &value);
                Ok(value)
            }
        }
    }

    /// Refreshes `key` now and waits for the fetch to finish
    ///
    /// Returns `false` without calling `fetcher` when a refresh for the key is
    /// already in flight.
    pub async fn refresh<T, F, Fut, E>(&self, key: &str, fetcher: F) -> bool
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match self.begin_or_skip(key) {
            Some(guard) => {
                self.run_refresh(guard, fetcher).await;
                true
            }
            None => false,
        }
    }

    /// Starts a background refresh of `key` on the current tokio runtime
    ///
    /// Returns `false` when a refresh is already in flight or no runtime is
    /// available.
    pub fn spawn_refresh<T, F, Fut, E>(&self, key: &str, fetcher: F) -> bool
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key, "no async runtime; background refresh not started");
            return false;
        };
        let Some(guard) = self.begin_or_skip(key) else {
            return false;
        };

        let coordinator = self.clone();
        runtime.spawn(async move {
            coordinator.run_refresh(guard, fetcher).await;
        });
        true
    }

    fn begin_or_skip(&self, key: &str) -> Option<RefreshGuard> {
        let guard = self.try_begin(key);
        if guard.is_none() {
            debug!(key, "refresh already in flight; skipping");
            self.publish(RefreshEvent::Skipped {
                key: key.to_string(),
            });
        }
        guard
    }

    async fn run_refresh<T, F, Fut, E>(&self, guard: RefreshGuard, fetcher: F)
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let key = guard.key().to_string();
        self.publish(RefreshEvent::Started { key: key.clone() });

        let outcome = match fetcher().await {
            Ok(value) => {
                self.cache.set(&key, &value);
                RefreshEvent::Completed { key }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "refresh failed; keeping cached entry");
                RefreshEvent::Failed {
                    key,
                    error: e.to_string(),
                }
            }
        };

        // Back to idle before subscribers hear about the outcome
        drop(guard);
        self.publish(outcome);
    }

    fn publish(&self, event: RefreshEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn inflight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
