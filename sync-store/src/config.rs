//! Store configuration.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL};
use crate::clock::Clock;
use crate::medium::StorageMedium;
use crate::store::{Store, DEFAULT_NAMESPACE};

/// Store and cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Prefix for every key the store writes (default: `offline_sync:`).
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Prefix for cache entries inside the namespace (default: `cache:`).
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// Default cache TTL in seconds (default: 300).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            cache_prefix: default_cache_prefix(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl StoreConfig {
    /// Default cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Build a store over `medium` in the configured namespace.
    pub fn build_store(&self, medium: Arc<dyn StorageMedium>, clock: Arc<dyn Clock>) -> Store {
        Store::with_namespace(medium, clock, self.namespace.clone())
    }

    /// Build the cache facade over `store`.
    pub fn build_cache(&self, store: Store) -> Cache {
        Cache::new(store, self.cache_prefix.clone(), self.cache_ttl())
    }
}
