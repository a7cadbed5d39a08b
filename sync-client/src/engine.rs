//! Composition root.
//!
//! [`SyncEngine`] wires one store, one cache, one offline queue and one
//! manager over a shared medium. Applications create it once and pass it
//! (or its parts) around instead of reaching for globals.

use std::sync::Arc;
use sync_store::{Cache, Clock, OfflineStore, StorageMedium, Store, StoreConfig};
use tokio::task::JoinHandle;

use crate::cleanup::spawn_cleanup_task;
use crate::config::{CleanupConfig, SyncConfig};
use crate::invoker::RemoteInvoker;
use crate::manager::SyncManager;
use crate::timers::TimerSlot;

/// Every offline-sync component, wired together.
#[derive(Debug)]
pub struct SyncEngine {
    store: Store,
    cache: Cache,
    manager: SyncManager,
    cleanup: TimerSlot,
}

impl SyncEngine {
    /// Build the engine over `medium`.
    pub fn new(
        medium: Arc<dyn StorageMedium>,
        clock: Arc<dyn Clock>,
        invoker: Arc<dyn RemoteInvoker>,
        store_config: &StoreConfig,
        sync_config: SyncConfig,
    ) -> Self {
        let store = store_config.build_store(medium, clock);
        let cache = store_config.build_cache(store.clone());
        let offline = OfflineStore::new(store.clone());
        let manager = SyncManager::new(offline, cache.clone(), invoker, sync_config);

        tracing::debug!(namespace = store.namespace(), "sync engine created");
        Self {
            store,
            cache,
            manager,
            cleanup: TimerSlot::new(),
        }
    }

    /// The TTL key-value store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The read-through cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The offline queue and snapshot cache.
    pub fn offline(&self) -> &OfflineStore {
        self.manager.offline()
    }

    /// The sync manager.
    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }

    /// Start periodic store cleanup, replacing any earlier task.
    pub fn start_cleanup(&self, config: CleanupConfig) {
        let handle: JoinHandle<()> = spawn_cleanup_task(self.store.clone(), config);
        self.cleanup.replace(handle);
    }

    /// Stop every background task and clear the queue.
    pub fn shutdown(&self) {
        self.cleanup.cancel();
        self.manager.destroy();
    }
}
