//! Persisted sync queue and last-known-good snapshots.
//!
//! Two fixed keys in the [`Store`]:
//! - [`SYNC_QUEUE_KEY`] holds the whole queue as one JSON array
//! - [`OFFLINE_DATA_KEY`] holds every snapshot as one JSON map
//!
//! Every mutation reads, modifies and rewrites the whole value while holding
//! a lock shared by every clone of the [`OfflineStore`], so a pass removing
//! delivered operations and a caller enqueueing new ones cannot overwrite
//! each other. A mutation whose read fails writes nothing and returns
//! `false`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use sync_types::{OperationId, SyncOperation};

use crate::error::StoreResult;
use crate::store::Store;

/// Store key of the sync queue.
pub const SYNC_QUEUE_KEY: &str = "sync_queue";

/// Store key of the snapshot map.
pub const OFFLINE_DATA_KEY: &str = "offline_data";

/// A last-known-good copy of some server data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSnapshot {
    /// Snapshot key.
    pub key: String,
    /// Snapshot contents.
    pub value: Value,
    /// Milliseconds since the Unix epoch when the snapshot was saved.
    pub saved_at: u64,
}

/// Derived view of the offline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Operations waiting in the queue.
    pub pending: usize,
    /// `enqueued_at` of the oldest pending operation.
    pub oldest_pending: Option<u64>,
    /// Snapshots held.
    pub snapshots: usize,
}

/// Offline queue and snapshot cache.
///
/// Clones share the same locks. Build one per store and clone it rather
/// than calling [`new`](Self::new) twice over the same namespace.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    store: Store,
    queue_lock: Arc<Mutex<()>>,
    data_lock: Arc<Mutex<()>>,
}

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OfflineStore {
    /// Create an offline store on top of `store`.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            queue_lock: Arc::new(Mutex::new(())),
            data_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    // ===========================================
    // Sync queue
    // ===========================================

    /// Append `op` to the queue.
    pub fn add_to_sync_queue(&self, op: &SyncOperation) -> bool {
        let _guard = hold(&self.queue_lock);
        let Some(mut queue) = self.queue_for_update() else {
            return false;
        };
        queue.push(op.clone());
        self.write_queue(&queue)
    }

    /// Every queued operation, in insertion order.
    ///
    /// Entries that fail to decode are skipped and logged; the rest of the
    /// queue is still returned. An unreadable queue is logged and reported
    /// as empty.
    pub fn sync_queue(&self) -> Vec<SyncOperation> {
        let _guard = hold(&self.queue_lock);
        self.try_sync_queue()
            .map_err(|e| tracing::warn!(error = %e, "sync queue unreadable"))
            .unwrap_or_default()
    }

    /// Replace the queued operation with the same id as `op`.
    ///
    /// Returns `false` if no such operation is queued, the queue could not
    /// be read, or the write failed.
    pub fn update_operation(&self, op: &SyncOperation) -> bool {
        let _guard = hold(&self.queue_lock);
        let Some(mut queue) = self.queue_for_update() else {
            return false;
        };
        let Some(slot) = queue.iter_mut().find(|queued| queued.id == op.id) else {
            return false;
        };
        *slot = op.clone();
        self.write_queue(&queue)
    }

    /// Remove the operation with `id`. Removing a missing id is a no-op.
    ///
    /// Returns `false` if the queue could not be read or the write failed.
    pub fn remove_from_sync_queue(&self, id: &OperationId) -> bool {
        let _guard = hold(&self.queue_lock);
        let Some(mut queue) = self.queue_for_update() else {
            return false;
        };
        let before = queue.len();
        queue.retain(|op| op.id != *id);
        if queue.len() == before {
            return true;
        }
        self.write_queue(&queue)
    }

    /// Drop every queued operation.
    pub fn clear_sync_queue(&self) -> bool {
        let _guard = hold(&self.queue_lock);
        self.store.remove(SYNC_QUEUE_KEY)
    }

    /// Check whether any operation is queued.
    pub fn has_pending_sync(&self) -> bool {
        !self.sync_queue().is_empty()
    }

    fn try_sync_queue(&self) -> StoreResult<Vec<SyncOperation>> {
        let Some(raw) = self.store.try_get::<Vec<Value>>(SYNC_QUEUE_KEY)? else {
            return Ok(vec![]);
        };
        Ok(raw
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(op) => Some(op),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable queue entry");
                    None
                }
            })
            .collect())
    }

    /// Read the queue for a rewrite. Caller holds the queue lock.
    fn queue_for_update(&self) -> Option<Vec<SyncOperation>> {
        self.try_sync_queue()
            .map_err(|e| tracing::warn!(error = %e, "sync queue unreadable, not rewriting"))
            .ok()
    }

    fn write_queue(&self, queue: &[SyncOperation]) -> bool {
        self.store.set(SYNC_QUEUE_KEY, queue, None)
    }

    // ===========================================
    // Snapshots
    // ===========================================

    /// Save `value` as the snapshot for `key`, replacing any earlier one.
    pub fn store_offline_data<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "snapshot not serializable");
                return false;
            }
        };

        let _guard = hold(&self.data_lock);
        let Some(mut data) = self.data_for_update() else {
            return false;
        };
        data.insert(
            key.to_string(),
            OfflineSnapshot {
                key: key.to_string(),
                value,
                saved_at: self.store.now_millis(),
            },
        );
        self.write_data(&data)
    }

    /// Every snapshot, keyed by snapshot key.
    pub fn offline_data(&self) -> BTreeMap<String, OfflineSnapshot> {
        let _guard = hold(&self.data_lock);
        self.store.get(OFFLINE_DATA_KEY).unwrap_or_default()
    }

    /// The snapshot value for `key`, decoded as `T`.
    pub fn offline_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let snapshot = self.offline_data().remove(key)?;
        serde_json::from_value(snapshot.value)
            .map_err(|e| tracing::warn!(key, error = %e, "snapshot has unexpected shape"))
            .ok()
    }

    /// Delete the snapshot for `key`.
    pub fn remove_offline_item(&self, key: &str) -> bool {
        let _guard = hold(&self.data_lock);
        let Some(mut data) = self.data_for_update() else {
            return false;
        };
        if data.remove(key).is_none() {
            return true;
        }
        self.write_data(&data)
    }

    /// Delete every snapshot.
    pub fn clear_offline_data(&self) -> bool {
        let _guard = hold(&self.data_lock);
        self.store.remove(OFFLINE_DATA_KEY)
    }

    /// Read the snapshot map for a rewrite. Caller holds the data lock.
    fn data_for_update(&self) -> Option<BTreeMap<String, OfflineSnapshot>> {
        self.store
            .try_get::<BTreeMap<String, OfflineSnapshot>>(OFFLINE_DATA_KEY)
            .map(Option::unwrap_or_default)
            .map_err(|e| tracing::warn!(error = %e, "snapshots unreadable, not rewriting"))
            .ok()
    }

    fn write_data(&self, data: &BTreeMap<String, OfflineSnapshot>) -> bool {
        self.store.set(OFFLINE_DATA_KEY, data, None)
    }

    // ===========================================
    // Derived
    // ===========================================

    /// Pending count, oldest pending timestamp and snapshot count.
    pub fn sync_stats(&self) -> SyncStats {
        let queue = self.sync_queue();
        SyncStats {
            pending: queue.len(),
            oldest_pending: queue.iter().map(|op| op.enqueued_at).min(),
            snapshots: self.offline_data().len(),
        }
    }
}
