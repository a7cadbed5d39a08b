//! Lifecycle events and pass outcomes.

use serde::{Deserialize, Serialize};

use crate::{OperationId, SyncOperation};

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A pass started.
    SyncStarted {
        /// Operations in the pass snapshot.
        total: usize,
    },
    /// One operation of the current pass settled.
    SyncProgress {
        /// Operations settled so far.
        completed: usize,
        /// Operations in the pass snapshot.
        total: usize,
    },
    /// A pass finished.
    SyncCompleted {
        /// Aggregated outcome.
        result: SyncResult,
    },
    /// An operation reached the server.
    OperationSuccess {
        /// The delivered operation.
        operation: SyncOperation,
    },
    /// An operation failed to dispatch.
    OperationError {
        /// The operation, with its updated attempt count.
        operation: SyncOperation,
        /// Failure description.
        error: String,
        /// `false` when the operation was dropped for good.
        will_retry: bool,
    },
    /// Connectivity changed.
    NetworkChanged {
        /// New connectivity state.
        online: bool,
    },
}

/// One failed dispatch recorded in a [`SyncResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Operation that failed.
    pub id: OperationId,
    /// Endpoint it targeted.
    pub endpoint: String,
    /// Failure description.
    pub error: String,
    /// The operation was removed and will not be retried.
    pub terminal: bool,
}

/// Aggregated outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// No failures during the pass.
    pub success: bool,
    /// Operations delivered.
    pub synced: usize,
    /// Operations that failed (retrying or terminal).
    pub failed: usize,
    /// Details for each failure.
    pub errors: Vec<OperationFailure>,
    /// The pass did not run (already syncing, offline, or nothing queued).
    pub skipped: bool,
}

impl SyncResult {
    /// Result for a pass that did not run.
    pub fn skipped() -> Self {
        Self {
            success: true,
            skipped: true,
            ..Self::default()
        }
    }

    /// Failures that exhausted their retry budget.
    pub fn terminal_failures(&self) -> impl Iterator<Item = &OperationFailure> {
        self.errors.iter().filter(|f| f.terminal)
    }
}
