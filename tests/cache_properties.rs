//! Integration tests for the read-through cache contract
//!
//! Exercises the public API end to end: freshness, key derivation, eviction,
//! durable-store faults and warm restarts.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

use sprintcache::cache::{
    derive_key, CacheConfig, CachedData, DurableStore, FileStore, ManualClock, MemoryStore,
    QueryParams, ReadThroughCache, StoreError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    buyer_id: u64,
    license: String,
    amount_cents: u64,
}

fn order(id: &str) -> Order {
    Order {
        id: id.to_string(),
        buyer_id: 17,
        license: "extended".to_string(),
        amount_cents: 12_900,
    }
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 8, 20, 14, 30, 0).unwrap())
}

/// Durable store that fails every call, like disabled browser storage
#[derive(Debug)]
struct ThrowingStore;

impl DurableStore for ThrowingStore {
    fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
    fn write(&self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::QuotaExceeded(key.into()))
    }
    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("storage disabled".into()))
    }
}

#[test]
fn test_round_trip_is_fresh() {
    let cache = ReadThroughCache::default().with_durable(MemoryStore::new());

    cache.set("orders?buyer=17", &vec![order("o-1"), order("o-2")]);
    let result: CachedData<Vec<Order>> = cache.get("orders?buyer=17");

    assert_eq!(result.value, Some(vec![order("o-1"), order("o-2")]));
    assert!(!result.is_stale);
}

#[test]
fn test_staleness_threshold() {
    let clock = clock();
    let cache = ReadThroughCache::default().with_clock(clock.clone());
    let ttl = Duration::from_secs(120);

    cache.set_with_ttl("order/o-1", &order("o-1"), ttl);

    clock.advance(ttl - Duration::from_millis(1));
    let before: CachedData<Order> = cache.get("order/o-1");
    assert!(!before.is_stale);

    clock.advance(Duration::from_millis(2));
    let after: CachedData<Order> = cache.get("order/o-1");
    assert!(after.is_stale, "Entry past its TTL should be stale");
    assert_eq!(after.value, Some(order("o-1")), "Stale does not mean absent");
}

#[test]
fn test_key_derivation_is_deterministic() {
    let ba = QueryParams::from_json(&json!({ "b": 2, "a": 1 }));
    let ab = QueryParams::from_json(&json!({ "a": 1, "b": 2 }));
    assert_eq!(derive_key("listings", &ba), derive_key("listings", &ab));

    let with_null = QueryParams::from_json(&json!({ "a": null, "b": 1 }));
    let without = QueryParams::from_json(&json!({ "b": 1 }));
    assert_eq!(derive_key("listings", &with_null), derive_key("listings", &without));
    assert_eq!(derive_key("listings", &without), "listings?b=1");
}

#[test]
fn test_last_write_wins() {
    let cache = ReadThroughCache::default().with_durable(MemoryStore::new());

    cache.set_with_ttl("order/o-1", &order("first"), Duration::from_secs(1));
    cache.set_with_ttl("order/o-1", &order("second"), Duration::from_secs(86_400));

    assert_eq!(cache.get::<Order>("order/o-1").value, Some(order("second")));
}

#[test]
fn test_evict_then_get_is_miss() {
    let cache = ReadThroughCache::default().with_durable(MemoryStore::new());

    cache.set("order/o-1", &order("o-1"));
    cache.evict("order/o-1");

    let result: CachedData<Order> = cache.get("order/o-1");
    assert!(result.value.is_none());
    assert!(result.is_stale);
}

#[test]
fn test_evict_all_leaves_unrelated_durable_keys() {
    let store = MemoryStore::new();
    store.write("sb-auth-token", "{\"access\":\"abc\"}").unwrap();
    store.write("theme", "dark").unwrap();
    let cache = ReadThroughCache::default().with_durable(store.clone());

    cache.set("listings", &vec![1, 2, 3]);
    cache.set("categories", &vec!["ui-kits"]);
    cache.evict_all();

    assert_eq!(
        store.list_keys().unwrap(),
        vec!["sb-auth-token".to_string(), "theme".to_string()]
    );
    assert_eq!(store.read("theme").unwrap().as_deref(), Some("dark"));
    assert!(cache.get::<Vec<i32>>("listings").value.is_none());
}

#[test]
fn test_throwing_durable_store_is_masked_by_memory() {
    let cache = ReadThroughCache::default().with_durable(ThrowingStore);

    cache.set("order/o-1", &order("o-1"));
    let result: CachedData<Order> = cache.get("order/o-1");

    assert_eq!(result.value, Some(order("o-1")));
    assert!(!result.is_stale);

    cache.evict("order/o-1");
    cache.evict_all();
    assert_eq!(cache.get::<Order>("order/o-1"), CachedData::miss());
}

#[test]
fn test_cold_start_restores_from_durable_store() {
    let store = MemoryStore::new();
    let clock = clock();

    {
        let process_a = ReadThroughCache::default()
            .with_durable(store.clone())
            .with_clock(clock.clone());
        process_a.set_with_ttl("order/o-1", &order("o-1"), Duration::from_secs(60));
    }

    let process_b = ReadThroughCache::default()
        .with_durable(store.clone())
        .with_clock(clock.clone());
    let fresh: CachedData<Order> = process_b.get("order/o-1");
    assert_eq!(fresh.value, Some(order("o-1")));
    assert!(!fresh.is_stale);

    clock.advance(Duration::from_secs(61));
    let process_c = ReadThroughCache::default()
        .with_durable(store)
        .with_clock(clock);
    let stale: CachedData<Order> = process_c.get("order/o-1");
    assert_eq!(stale.value, Some(order("o-1")));
    assert!(stale.is_stale);
}

#[test]
fn test_cold_start_from_file_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let key = derive_key("kits", &QueryParams::new().with("seller", 7).with("status", "live"));

    ReadThroughCache::default()
        .with_durable(FileStore::with_dir(temp_dir.path()))
        .set(&key, &json!({ "total": 3 }));

    let restarted = ReadThroughCache::default().with_durable(FileStore::with_dir(temp_dir.path()));
    let result: CachedData<serde_json::Value> = restarted.get(&key);

    assert_eq!(result.value, Some(json!({ "total": 3 })));
    assert_eq!(restarted.durable_keys(), vec![key]);
}

#[test]
fn test_quota_exceeded_keeps_entry_for_session_only() {
    let store = MemoryStore::new().with_quota(16);
    let cache = ReadThroughCache::default().with_durable(store.clone());

    cache.set("order/o-1", &order("o-1"));

    assert_eq!(cache.get::<Order>("order/o-1").value, Some(order("o-1")));
    assert!(store.list_keys().unwrap().is_empty(), "Durable write should have failed");

    let restarted = ReadThroughCache::default().with_durable(store);
    assert_eq!(restarted.get::<Order>("order/o-1"), CachedData::miss());
}

#[test]
fn test_namespaces_isolate_caches_sharing_a_store() {
    let store = MemoryStore::new();
    let store_config = CacheConfig::new().with_namespace("store").expect("Valid namespace");
    let admin_config = CacheConfig::new().with_namespace("admin").expect("Valid namespace");
    let storefront = ReadThroughCache::new(store_config.clone()).with_durable(store.clone());
    let admin = ReadThroughCache::new(admin_config).with_durable(store.clone());

    storefront.set("listings", &1);
    admin.set("listings", &2);
    admin.evict_all();

    let restarted = ReadThroughCache::new(store_config).with_durable(store);
    assert_eq!(restarted.get::<i32>("listings").value, Some(1));
    assert_eq!(admin.get::<i32>("listings"), CachedData::miss());
}

#[test]
fn test_empty_namespace_cannot_claim_the_whole_store() {
    assert!(CacheConfig::new().with_namespace("").is_err());

    let store = MemoryStore::new();
    store.write("sb-auth-token", "{\"access\":\"abc\"}").unwrap();
    let admin_config = CacheConfig::new()
        .with_namespace("sprintsaas_cache_admin")
        .expect("Valid namespace");
    let admin = ReadThroughCache::new(admin_config).with_durable(store.clone());
    admin.set("review-queue", &vec![4, 5]);

    ReadThroughCache::default().with_durable(store.clone()).evict_all();

    assert_eq!(
        store.list_keys().unwrap(),
        vec![
            "sb-auth-token".to_string(),
            "sprintsaas_cache_admin:review-queue".to_string()
        ]
    );
}

#[test]
fn test_cold_start_from_file_store_with_long_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let search = "responsive dashboard template with dark mode ".repeat(5);
    let key = derive_key(
        "listings",
        &QueryParams::new()
            .with("search", search.as_str())
            .with("category", "saas")
            .with("page", 3),
    );
    assert!(key.len() > 200);

    ReadThroughCache::default()
        .with_durable(FileStore::with_dir(temp_dir.path()))
        .set(&key, &json!({ "total": 12 }));

    let restarted = ReadThroughCache::default().with_durable(FileStore::with_dir(temp_dir.path()));
    let result: CachedData<serde_json::Value> = restarted.get(&key);

    assert_eq!(result.value, Some(json!({ "total": 12 })));
    assert!(!result.is_stale);
    assert_eq!(restarted.durable_keys(), vec![key]);
}
