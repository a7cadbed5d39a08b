//! Timer handle tables.
//!
//! Every timer the manager arms is a spawned task. Its `JoinHandle` is
//! kept here so it can be replaced or cancelled; replacing a timer aborts
//! the stale task.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use sync_types::OperationId;
use tokio::task::JoinHandle;

/// Per-operation retry timers.
#[derive(Debug, Default)]
pub struct RetryTimers {
    handles: Mutex<HashMap<OperationId, JoinHandle<()>>>,
}

impl RetryTimers {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationId, JoinHandle<()>>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm the retry timer for `id`, aborting any earlier one.
    pub fn schedule(&self, id: OperationId, handle: JoinHandle<()>) {
        if let Some(stale) = self.lock().insert(id, handle) {
            stale.abort();
        }
    }

    /// Cancel the retry timer for `id`. Returns `true` if one was armed.
    pub fn cancel(&self, id: &OperationId) -> bool {
        match self.lock().remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every retry timer.
    pub fn cancel_all(&self) {
        for (_, handle) in self.lock().drain() {
            handle.abort();
        }
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.lock().values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for RetryTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// A single replaceable timer (fallback re-sync, auto-sync, cleanup).
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm the slot, aborting whatever it held.
    pub fn replace(&self, handle: JoinHandle<()>) {
        if let Some(stale) = self.lock().replace(handle) {
            stale.abort();
        }
    }

    /// Disarm the slot. Returns `true` if it held a timer.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether the slot holds a timer that has not finished.
    pub fn is_armed(&self) -> bool {
        self.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
