//! # sync-client
//!
//! Async sync manager for offline-sync.
//!
//! This is the library applications use to queue mutations while offline
//! and deliver them once connectivity allows.
//!
//! ## Features
//!
//! - **Durable queue**: every operation is persisted before `add_operation` returns
//! - **Priority batches**: High before Medium before Low, oldest first, five at a time
//! - **Retry with backoff**: `base · 2^(attempts-1)`, dropped after `max_attempts`
//! - **Cache invalidation**: delivered writes evict cached reads of the resources they touched
//! - **Invoker abstraction**: pluggable remote endpoint ([`MockInvoker`] for tests)
//! - **Pure state machine**: status transitions come from sync-core
//!
//! ## Example
//!
//! ```ignore
//! use sync_client::{MockInvoker, SyncConfig, SyncEngine};
//! use sync_store::{SqliteMedium, StoreConfig, SystemClock};
//!
//! let engine = SyncEngine::new(
//!     Arc::new(SqliteMedium::open(path)?),
//!     Arc::new(SystemClock),
//!     Arc::new(MockInvoker::new()),
//!     &StoreConfig::default(),
//!     SyncConfig::default(),
//! );
//!
//! engine.manager().add_operation(OperationKind::Create, "/teachers", Some(body), Priority::High)?;
//! let result = engine.manager().sync().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod engine;
pub mod events;
pub mod invoker;
pub mod manager;
pub mod timers;

pub use cleanup::spawn_cleanup_task;
pub use config::{CleanupConfig, SyncConfig};
pub use engine::SyncEngine;
pub use events::{EventBus, ListenerId, EVENT_CHANNEL_CAPACITY};
pub use invoker::{InvokeError, MockInvoker, RemoteInvoker, RemoteRequest};
pub use manager::{ManagerError, SyncManager};
