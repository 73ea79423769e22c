//! Cache entry and lookup result types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cached payload together with its freshness window
///
/// Entries are never mutated once written. A refresh writes a new entry under
/// the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached data
    pub value: T,
    /// When the data was cached
    pub written_at: DateTime<Utc>,
    /// When the data becomes stale
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Creates an entry written at `written_at` that goes stale after `ttl`
    ///
    /// A TTL too large to represent saturates at the maximum timestamp, so
    /// `expires_at >= written_at` always holds.
    pub fn new(value: T, written_at: DateTime<Utc>, ttl: std::time::Duration) -> Self {
        let expires_at = Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| written_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            written_at,
            expires_at,
        }
    }

    /// Whether the entry is past its expiry at `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the timestamps are consistent; records failing this are corrupt
    pub(crate) fn is_well_formed(&self) -> bool {
        self.expires_at >= self.written_at
    }
}

/// Result of reading from the cache
///
/// A missing entry reads as `value: None, is_stale: true`, so callers can
/// treat "absent" and "stale" the same when deciding to refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    /// The cached data, if any
    pub value: Option<T>,
    /// Whether the caller should revalidate
    pub is_stale: bool,
}

impl<T> CachedData<T> {
    /// The result for a key with no usable entry
    pub fn miss() -> Self {
        Self {
            value: None,
            is_stale: true,
        }
    }

    /// Whether a fresh value was found
    pub fn is_fresh(&self) -> bool {
        self.value.is_some() && !self.is_stale
    }
}
