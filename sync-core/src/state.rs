//! Sync status state machine for offline-sync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! drain lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (dispatching operations, arming timers) is performed by
//! sync-client, not by this module.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use sync_types::SyncEvent;

/// Delay before the safety-net re-sync that follows a failed pass.
pub const FALLBACK_RESYNC_DELAY: Duration = Duration::from_secs(5 * 60);

/// Outcome-oriented status reported to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No pass has run yet.
    #[default]
    Idle,
    /// A pass is in flight.
    Syncing,
    /// The last pass had no failures.
    Success,
    /// The last pass had at least one unresolved failure.
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Sync state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    status: SyncStatus,
    online: bool,
}

impl SyncState {
    /// Create a new state machine in the Idle state.
    pub fn new(online: bool) -> Self {
        Self {
            status: SyncStatus::Idle,
            online,
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match event {
            Event::WentOnline if !self.online => {
                let next = Self {
                    online: true,
                    ..self
                };
                let mut actions = vec![Action::EmitEvent(SyncEvent::NetworkChanged { online: true })];
                if !self.is_syncing() {
                    actions.push(Action::RequestPass);
                }
                (next, actions)
            }
            // Going offline never preempts an in-flight pass.
            Event::WentOffline if self.online => (
                Self {
                    online: false,
                    ..self
                },
                vec![Action::EmitEvent(SyncEvent::NetworkChanged { online: false })],
            ),

            Event::PassRequested { pending } => {
                if self.is_syncing() || !self.online || pending == 0 {
                    return (self, vec![]);
                }
                (
                    Self {
                        status: SyncStatus::Syncing,
                        ..self
                    },
                    vec![
                        Action::StartPass,
                        Action::EmitEvent(SyncEvent::SyncStarted { total: pending }),
                    ],
                )
            }

            Event::PassFinished { failed } if self.is_syncing() => {
                if failed == 0 {
                    (
                        Self {
                            status: SyncStatus::Success,
                            ..self
                        },
                        vec![Action::CancelFallback],
                    )
                } else {
                    (
                        Self {
                            status: SyncStatus::Error,
                            ..self
                        },
                        vec![Action::ScheduleFallback],
                    )
                }
            }

            // Invalid or redundant transitions - stay in current state
            _ => (self, vec![]),
        }
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Whether connectivity is currently believed available.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Check if a pass is in flight.
    pub fn is_syncing(&self) -> bool {
        self.status == SyncStatus::Syncing
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Events that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Connectivity became available.
    WentOnline,
    /// Connectivity was lost.
    WentOffline,
    /// Something asked for a pass.
    PassRequested {
        /// Operations currently queued.
        pending: usize,
    },
    /// The in-flight pass settled.
    PassFinished {
        /// Operations that failed during the pass.
        failed: usize,
    },
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run a pass now (the state is already `Syncing`).
    StartPass,
    /// Ask for a pass; the manager re-reads the queue and feeds
    /// [`Event::PassRequested`].
    RequestPass,
    /// Arm the safety-net re-sync timer.
    ScheduleFallback,
    /// Disarm the safety-net re-sync timer.
    CancelFallback,
    /// Emit an event to the application.
    EmitEvent(SyncEvent),
}
