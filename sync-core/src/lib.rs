//! # sync-core
//!
//! Pure logic for offline-sync (no I/O, instant tests).
//!
//! This crate implements the state machine and scheduling algorithms for
//! draining the offline queue without any network, disk, or timer I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (remote calls, storage, timers) is performed by
//! `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod invalidation;
pub mod retry;
pub mod schedule;
pub mod state;

pub use invalidation::{InvalidationRules, DEFAULT_RESOURCES};
pub use retry::{backoff_delay, FailureOutcome, RetryPolicy, DEFAULT_BASE_DELAY};
pub use schedule::{dispatch_order, PassPlan, DEFAULT_BATCH_SIZE};
pub use state::{Action, Event, SyncState, SyncStatus, FALLBACK_RESYNC_DELAY};
