//! Namespaced TTL key-value store.
//!
//! Every value is wrapped in a [`StoredItem`] envelope and written as JSON
//! under `namespace + key`. Expiry is lazy: a read that finds an expired
//! item deletes it and reports it absent. [`Store::cleanup`] is the eager
//! counterpart, meant to be driven by a periodic task.
//!
//! Public methods never fail loudly. Medium and serialization errors are
//! logged and surface as `false`/`None`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::StoreResult;
use crate::medium::StorageMedium;

/// Key prefix used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "offline_sync:";

/// On-disk envelope for every stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem<T> {
    /// The stored value.
    pub value: T,
    /// Milliseconds since the Unix epoch when the value was written.
    pub written_at: u64,
    /// Milliseconds since the Unix epoch at which the value expires.
    pub expires_at: Option<u64>,
}

impl<T> StoredItem<T> {
    /// Check whether the item has expired at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// How [`Store::import`] treats keys that already hold a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Imported entries replace existing ones.
    #[default]
    Overwrite,
    /// Only keys without a live value are written.
    FillMissing,
}

/// The durable store.
///
/// Cheap to clone; clones share the medium and clock.
#[derive(Clone)]
pub struct Store {
    medium: Arc<dyn StorageMedium>,
    clock: Arc<dyn Clock>,
    namespace: String,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create a store over `medium` using the default namespace.
    pub fn new(medium: Arc<dyn StorageMedium>, clock: Arc<dyn Clock>) -> Self {
        Self::with_namespace(medium, clock, DEFAULT_NAMESPACE)
    }

    /// Create a store whose keys live under `namespace`.
    pub fn with_namespace(
        medium: Arc<dyn StorageMedium>,
        clock: Arc<dyn Clock>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            medium,
            clock,
            namespace: namespace.into(),
        }
    }

    /// The namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The clock used for timestamps and expiry.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current time according to the store's clock.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    // ===========================================
    // Single-key operations
    // ===========================================

    /// Store `value` under `key`, expiring after `ttl` if given.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        self.try_set(key, value, ttl)
            .map_err(|e| tracing::warn!(key, error = %e, "store write failed"))
            .is_ok()
    }

    /// Read the live value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.try_get(key)
            .map_err(|e| tracing::warn!(key, error = %e, "store read failed"))
            .ok()
            .flatten()
    }

    /// Delete `key`.
    pub fn remove(&self, key: &str) -> bool {
        self.medium
            .remove_item(&self.full_key(key))
            .map_err(|e| tracing::warn!(key, error = %e, "store remove failed"))
            .is_ok()
    }

    /// Check whether `key` holds a live value.
    pub fn has(&self, key: &str) -> bool {
        self.read_item(key)
            .map_err(|e| tracing::warn!(key, error = %e, "store read failed"))
            .ok()
            .flatten()
            .is_some()
    }

    /// Delete every key in the namespace.
    pub fn clear(&self) -> bool {
        self.try_clear()
            .map_err(|e| tracing::warn!(namespace = %self.namespace, error = %e, "store clear failed"))
            .is_ok()
    }

    /// Keys in the namespace, without the namespace prefix.
    ///
    /// Expired entries not yet evicted are included.
    pub fn keys(&self) -> Vec<String> {
        match self.namespaced_keys() {
            Ok(keys) => keys
                .into_iter()
                .map(|k| k[self.namespace.len()..].to_string())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "store key listing failed");
                vec![]
            }
        }
    }

    /// Keys in the namespace that start with `prefix`, without the
    /// namespace prefix.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }

    // ===========================================
    // Bulk operations
    // ===========================================

    /// Store several values with a shared TTL.
    ///
    /// Every item is attempted; returns `true` only if all succeeded.
    pub fn set_multiple<K, T, I>(&self, items: I, ttl: Option<Duration>) -> bool
    where
        K: AsRef<str>,
        T: Serialize,
        I: IntoIterator<Item = (K, T)>,
    {
        items
            .into_iter()
            .fold(true, |ok, (key, value)| self.set(key.as_ref(), &value, ttl) && ok)
    }

    /// Read several keys; only live values appear in the result.
    pub fn get_multiple<T, K>(&self, keys: &[K]) -> HashMap<String, T>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        keys.iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.get(key).map(|value| (key.to_string(), value))
            })
            .collect()
    }

    /// Delete several keys. Returns `true` only if all deletions succeeded.
    pub fn remove_multiple<K: AsRef<str>>(&self, keys: &[K]) -> bool {
        keys.iter()
            .fold(true, |ok, key| self.remove(key.as_ref()) && ok)
    }

    // ===========================================
    // Maintenance
    // ===========================================

    /// Evict every expired or unreadable entry in the namespace.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        match self.try_cleanup() {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(removed, "store cleanup evicted entries");
                }
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "store cleanup failed");
                0
            }
        }
    }

    /// Bytes used by the namespace (keys plus serialized values).
    pub fn usage(&self) -> usize {
        self.usage_with_prefix("")
    }

    /// Bytes used by namespace entries whose key starts with `prefix`.
    pub fn usage_with_prefix(&self, prefix: &str) -> usize {
        self.try_usage(prefix)
            .map_err(|e| tracing::warn!(error = %e, "store usage accounting failed"))
            .unwrap_or(0)
    }

    /// Serialize every live entry in the namespace as a JSON object keyed
    /// by (unprefixed) key.
    pub fn export(&self) -> Option<String> {
        self.try_export()
            .map_err(|e| tracing::warn!(error = %e, "store export failed"))
            .ok()
    }

    /// Restore entries produced by [`export`](Self::export).
    ///
    /// Entries that have already expired are skipped. Returns the number of
    /// entries written, or `None` if the input could not be parsed or a
    /// write failed.
    pub fn import(&self, json: &str, mode: ImportMode) -> Option<usize> {
        match self.try_import(json, mode) {
            Ok(written) => {
                tracing::info!(written, ?mode, "store import complete");
                Some(written)
            }
            Err(e) => {
                tracing::warn!(error = %e, "store import failed");
                None
            }
        }
    }

    // ===========================================
    // Internals
    // ===========================================

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn namespaced_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .medium
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(&self.namespace))
            .collect())
    }

    fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        let written_at = self.now_millis();
        let expires_at = ttl.map(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            written_at.saturating_add(ttl_ms)
        });
        let item = StoredItem {
            value,
            written_at,
            expires_at,
        };
        self.write_item(key, &item)
    }

    fn write_item<T: Serialize>(&self, key: &str, item: &StoredItem<T>) -> StoreResult<()> {
        let raw = serde_json::to_string(item)?;
        self.medium.set_item(&self.full_key(key), &raw)?;
        Ok(())
    }

    fn try_clear(&self) -> StoreResult<()> {
        for full_key in self.namespaced_keys()? {
            self.medium.remove_item(&full_key)?;
        }
        Ok(())
    }

    fn try_cleanup(&self) -> StoreResult<usize> {
        let now = self.now_millis();
        let mut removed = 0;
        for full_key in self.namespaced_keys()? {
            let Some(raw) = self.medium.get_item(&full_key)? else {
                continue;
            };
            let evict = match serde_json::from_str::<StoredItem<Value>>(&raw) {
                Ok(item) => item.is_expired(now),
                Err(_) => true,
            };
            if evict {
                self.medium.remove_item(&full_key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn try_usage(&self, prefix: &str) -> StoreResult<usize> {
        let mut total = 0;
        for full_key in self.namespaced_keys()? {
            if !full_key[self.namespace.len()..].starts_with(prefix) {
                continue;
            }
            if let Some(raw) = self.medium.get_item(&full_key)? {
                total += full_key.len() + raw.len();
            }
        }
        Ok(total)
    }

    fn try_export(&self) -> StoreResult<String> {
        let now = self.now_millis();
        let mut entries = BTreeMap::new();
        for full_key in self.namespaced_keys()? {
            let Some(raw) = self.medium.get_item(&full_key)? else {
                continue;
            };
            match serde_json::from_str::<StoredItem<Value>>(&raw) {
                Ok(item) if !item.is_expired(now) => {
                    entries.insert(full_key[self.namespace.len()..].to_string(), item);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(key = %full_key, error = %e, "skipping unreadable entry"),
            }
        }
        Ok(serde_json::to_string(&entries)?)
    }

    fn try_import(&self, json: &str, mode: ImportMode) -> StoreResult<usize> {
        let now = self.now_millis();
        let entries: BTreeMap<String, StoredItem<Value>> = serde_json::from_str(json)?;
        let mut written = 0;
        for (key, item) in entries {
            if item.is_expired(now) {
                continue;
            }
            if mode == ImportMode::FillMissing && self.read_item(&key)?.is_some() {
                continue;
            }
            self.write_item(&key, &item)?;
            written += 1;
        }
        Ok(written)
    }

    /// Like [`get`](Self::get), but a failed read is reported instead of
    /// being folded into `None`.
    pub(crate) fn try_get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.read_item(key)? {
            Some(item) => Ok(Some(serde_json::from_value(item.value)?)),
            None => Ok(None),
        }
    }

    /// Read the live envelope under `key`, evicting it if expired or
    /// unreadable.
    fn read_item(&self, key: &str) -> StoreResult<Option<StoredItem<Value>>> {
        let full_key = self.full_key(key);
        let Some(raw) = self.medium.get_item(&full_key)? else {
            return Ok(None);
        };

        let item: StoredItem<Value> = match serde_json::from_str(&raw) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(key, error = %e, "evicting unreadable entry");
                self.medium.remove_item(&full_key)?;
                return Ok(None);
            }
        };

        if item.is_expired(self.now_millis()) {
            tracing::debug!(key, "evicting expired entry");
            self.medium.remove_item(&full_key)?;
            return Ok(None);
        }

        Ok(Some(item))
    }
}
