//! In-memory storage medium.
//!
//! Used as the test double for every layer above it. An optional byte
//! quota lets tests reproduce a full medium, and scripted read failures
//! reproduce an unreachable one.

use super::StorageMedium;
use crate::error::{MediumError, MediumResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory medium, ordered by key.
///
/// Clones share the same underlying map, which lets tests hand one clone
/// to the system under test and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    inner: Arc<Mutex<MemoryMediumInner>>,
}

#[derive(Debug, Default)]
struct MemoryMediumInner {
    items: BTreeMap<String, String>,
    quota: Option<usize>,
    failing_reads: usize,
}

impl MemoryMediumInner {
    fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl MemoryMedium {
    /// Create an empty, unbounded medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty medium that rejects writes beyond `quota` bytes
    /// (keys plus values).
    pub fn with_quota(quota: usize) -> Self {
        let medium = Self::default();
        medium.lock().quota = Some(quota);
        medium
    }

    /// Change or lift the quota.
    pub fn set_quota(&self, quota: Option<usize>) {
        self.lock().quota = quota;
    }

    /// Fail the next `count` calls to `get_item` with
    /// [`MediumError::Unavailable`].
    pub fn fail_next_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    /// Bytes currently held (keys plus values).
    pub fn used_bytes(&self) -> usize {
        self.lock().used_bytes()
    }

    /// Raw value under `key`, bypassing the trait (for assertions).
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().items.get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryMediumInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> MediumResult<Option<String>> {
        let mut inner = self.lock();
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(MediumError::Unavailable(format!("read of {key} refused")));
        }
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> MediumResult<()> {
        let mut inner = self.lock();

        if let Some(quota) = inner.quota {
            let replaced = inner.items.get(key).map_or(0, |old| key.len() + old.len());
            let needed = inner.used_bytes() - replaced + key.len() + value.len();
            if needed > quota {
                return Err(MediumError::QuotaExceeded { needed, quota });
            }
        }

        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> MediumResult<()> {
        self.lock().items.remove(key);
        Ok(())
    }

    fn clear(&self) -> MediumResult<()> {
        self.lock().items.clear();
        Ok(())
    }

    fn len(&self) -> MediumResult<usize> {
        Ok(self.lock().items.len())
    }

    fn key(&self, index: usize) -> MediumResult<Option<String>> {
        Ok(self.lock().items.keys().nth(index).cloned())
    }

    fn keys(&self) -> MediumResult<Vec<String>> {
        Ok(self.lock().items.keys().cloned().collect())
    }
}
