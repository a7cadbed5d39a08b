//! # sync-types
//!
//! Shared data model for the offline-sync engine.
//!
//! This crate provides the foundational types used across all offline-sync crates:
//! - [`OperationId`] - Identity of a queued mutation
//! - [`SyncOperation`], [`OperationKind`], [`Priority`] - The persisted queue entry
//! - [`SyncEvent`], [`SyncResult`] - Lifecycle notifications and pass outcomes
//! - [`SyncError`] - Error types
//!
//! Every type here has a stable serde shape: operations are persisted as
//! camelCase JSON objects inside the offline queue.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod ids;
mod operation;

pub use error::SyncError;
pub use event::{OperationFailure, SyncEvent, SyncResult};
pub use ids::OperationId;
pub use operation::{HttpMethod, OperationKind, Priority, SyncOperation, DEFAULT_MAX_ATTEMPTS};
