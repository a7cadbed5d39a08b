//! Read-through cache on top of [`Store`].
//!
//! Cache keys live under their own prefix inside the store namespace, so
//! `clear` and `stats` never see queue or snapshot entries.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::store::Store;

/// Key prefix used when none is configured.
pub const DEFAULT_CACHE_PREFIX: &str = "cache:";

/// TTL applied when a write does not name one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Count and size of the entries under the cache prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Entries currently held, including expired ones not yet evicted.
    pub entries: usize,
    /// Bytes used (keys plus serialized values).
    pub usage_bytes: usize,
}

/// Prefixed cache facade.
#[derive(Debug, Clone)]
pub struct Cache {
    store: Store,
    prefix: String,
    default_ttl: Duration,
}

impl Cache {
    /// Create a cache over `store`.
    pub fn new(store: Store, prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// Create a cache with the default prefix and TTL.
    pub fn with_defaults(store: Store) -> Self {
        Self::new(store, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL)
    }

    /// The key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// TTL used when none is passed.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Cache `value` under `key` for `ttl`, or the default TTL.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        self.store
            .set(&self.cache_key(key), value, Some(ttl.unwrap_or(self.default_ttl)))
    }

    /// Read a live cached value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store.get(&self.cache_key(key))
    }

    /// Drop a cached value.
    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(&self.cache_key(key))
    }

    /// Check whether `key` holds a live cached value.
    pub fn has(&self, key: &str) -> bool {
        self.store.has(&self.cache_key(key))
    }

    /// Return the cached value for `key`, or run `fetcher` and cache what
    /// it yields.
    ///
    /// A fetcher error is returned unchanged and nothing is cached.
    /// Concurrent calls for the same missing key each run their own fetcher.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key) {
            tracing::trace!(key, "cache hit");
            return Ok(cached);
        }

        tracing::trace!(key, "cache miss");
        let value = fetcher().await?;
        self.set(key, &value, ttl);
        Ok(value)
    }

    /// Remove every cached entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        self.invalidate_prefix("")
    }

    /// Remove every cached entry whose key starts with `prefix`.
    ///
    /// Returns the number removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let keys = self.store.keys_with_prefix(&self.cache_key(prefix));
        let removed = keys.iter().filter(|key| self.store.remove(key)).count();
        if removed > 0 {
            tracing::debug!(prefix, removed, "cache entries invalidated");
        }
        removed
    }

    /// Entry count and byte usage under the cache prefix.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.keys_with_prefix(&self.prefix).len(),
            usage_bytes: self.store.usage_with_prefix(&self.prefix),
        }
    }
}
