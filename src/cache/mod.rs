//! Read-through cache for storefront query results
//!
//! This module provides a two-layer cache: an in-memory map that serves repeat
//! reads without re-parsing, mirrored into a durable key/value store so entries
//! survive a restart. Entries carry an expiry timestamp, and expired entries are
//! still returned (with `is_stale = true`) so callers can serve stale data while
//! they revalidate.
//!
//! The cache never reports errors to callers. A durable store that is missing,
//! throwing or holding corrupt data only degrades durability; the memory layer
//! stays authoritative for the lifetime of the process.
//!
//! The memory layer is shared by every holder of the cache handle. Callers are
//! responsible for choosing key bases that do not collide across features.

mod clock;
mod config;
mod durable;
mod entry;
mod file_store;
mod key;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    parse_namespace, presets, CacheConfig, ConfigError, DEFAULT_NAMESPACE, NAMESPACE_SEPARATOR,
};
pub use durable::{DurableStore, MemoryStore, StoreError};
pub use entry::{CacheEntry, CachedData};
pub use file_store::FileStore;
pub use key::{derive_key, QueryParams};
pub use manager::ReadThroughCache;
