//! Cache configuration

use std::time::Duration;
use thiserror::Error;

/// Namespace of entries owned by the storefront cache
pub const DEFAULT_NAMESPACE: &str = "sprintsaas_cache";

/// Ends the namespace inside a durable key: `"{namespace}:{cache key}"`.
/// Namespaces may not contain it, so the first occurrence always marks the
/// end of the namespace even when the cache key contains it too.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Standard time-to-live values for cached query results
pub mod presets {
    use std::time::Duration;

    /// For data that changes often (notifications, order status)
    pub const SHORT: Duration = Duration::from_secs(60);
    /// Default for listing and dashboard queries
    pub const DEFAULT: Duration = Duration::from_secs(5 * 60);
    /// For data that rarely changes (categories, seller profiles)
    pub const LONG: Duration = Duration::from_secs(30 * 60);
}

/// Errors building a cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An empty namespace would claim every key in the durable store
    #[error("Namespace must not be empty")]
    EmptyNamespace,

    /// The namespace contains the separator
    #[error("Namespace '{0}' must not contain ':'")]
    InvalidNamespace(String),
}

/// Checks that `namespace` can own durable keys unambiguously
///
/// Also usable as a clap `value_parser`.
pub fn parse_namespace(namespace: &str) -> Result<String, ConfigError> {
    if namespace.is_empty() {
        Err(ConfigError::EmptyNamespace)
    } else if namespace.contains(NAMESPACE_SEPARATOR) {
        Err(ConfigError::InvalidNamespace(namespace.to_string()))
    } else {
        Ok(namespace.to_string())
    }
}

/// Settings shared by every operation on a cache instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Owner of the cache's durable keys; `evict_all` only touches these
    namespace: String,
    /// TTL used by `set` when the caller does not pass one
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: presets::DEFAULT,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the durable-key namespace.
    pub fn with_namespace(mut self, namespace: &str) -> Result<Self, ConfigError> {
        self.namespace = parse_namespace(namespace)?;
        Ok(self)
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The durable key holding `key`
    pub fn durable_key(&self, key: &str) -> String {
        format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, key)
    }

    /// The cache key stored under `durable_key`, if this namespace owns it
    pub fn owned_key<'a>(&self, durable_key: &'a str) -> Option<&'a str> {
        let (namespace, key) = durable_key.split_once(NAMESPACE_SEPARATOR)?;
        (namespace == self.namespace).then_some(key)
    }
}
