//! # sync-store
//!
//! Durable storage for offline-sync.
//!
//! Layers, leaves first:
//! - [`StorageMedium`] - synchronous string-keyed medium ([`MemoryMedium`], [`SqliteMedium`])
//! - [`Store`] - namespaced TTL key-value store with lazy expiry, bulk
//!   operations, usage accounting and export/import
//! - [`Cache`] - prefixed read-through cache with bulk invalidation
//! - [`OfflineStore`] - the persisted sync queue and last-known-good snapshots
//!
//! Storage faults never escape the [`Store`] boundary: they are logged and
//! reported as `false`/`None`.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sync_store::{MemoryMedium, Store, SystemClock};
//!
//! let store = Store::new(Arc::new(MemoryMedium::new()), Arc::new(SystemClock));
//! store.set("greeting", &"hello", Some(Duration::from_secs(60)));
//! let value: Option<String> = store.get("greeting");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod medium;
pub mod offline;
pub mod store;

pub use cache::{Cache, CacheStats, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{MediumError, StoreError};
pub use medium::{MemoryMedium, SqliteMedium, StorageMedium};
pub use offline::{OfflineSnapshot, OfflineStore, SyncStats, OFFLINE_DATA_KEY, SYNC_QUEUE_KEY};
pub use store::{ImportMode, Store, StoredItem, DEFAULT_NAMESPACE};
