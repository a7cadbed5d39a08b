//! Pass planning for offline-sync.
//!
//! A pass drains a snapshot of the queue taken at pass start:
//! - Priority ordering (High, Medium, Low)
//! - FIFO by enqueue time within a priority, stable for ties
//! - Fixed-size batches, dispatched one batch at a time
//!
//! Operations enqueued after the snapshot wait for the next pass.

use sync_types::SyncOperation;

/// Maximum concurrent dispatches per batch when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Sort operations into dispatch order.
///
/// The sort is stable, so operations sharing priority and timestamp keep
/// their queue order.
pub fn dispatch_order(mut ops: Vec<SyncOperation>) -> Vec<SyncOperation> {
    ops.sort_by_key(|op| (op.priority, op.enqueued_at));
    ops
}

/// The ordered, batched work of one pass.
#[derive(Debug, Clone)]
pub struct PassPlan {
    batch_size: usize,
    ops: Vec<SyncOperation>,
}

impl PassPlan {
    /// Plan a pass over a queue snapshot.
    ///
    /// A batch size of zero is treated as one.
    pub fn new(snapshot: Vec<SyncOperation>, batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ops: dispatch_order(snapshot),
        }
    }

    /// Operations in dispatch order.
    pub fn operations(&self) -> &[SyncOperation] {
        &self.ops
    }

    /// Batches in dispatch order; every batch but the last is full.
    pub fn batches(&self) -> impl Iterator<Item = &[SyncOperation]> {
        self.ops.chunks(self.batch_size)
    }

    /// Number of batches.
    pub fn batch_count(&self) -> usize {
        self.ops.len().div_ceil(self.batch_size)
    }

    /// Total operations in the pass.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the pass has nothing to dispatch.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
