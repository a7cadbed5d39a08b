//! SyncManager - drains the offline queue.
//!
//! # Architecture
//!
//! The manager writes the offline queue through its own handle. Status
//! transitions come from the pure state machine in sync-core; the manager
//! interprets the returned actions and performs the I/O.
//!
//! ```text
//! add_operation ─► OfflineStore ◄─ pass ─► RemoteInvoker ─► Server
//!                                   │
//!                     sync-core (state machine, ordering, backoff)
//! ```
//!
//! A pass snapshots the queue, orders it, and dispatches it in batches.
//! Dispatches inside a batch run concurrently; batches run one after the
//! other. At most one pass is active at a time.
//!
//! Timers (per-operation retry, fallback re-sync, auto-sync) are spawned
//! tasks holding a `Weak` reference, so dropping the last manager handle
//! ends them.
//!
//! # Example
//!
//! ```ignore
//! let manager = SyncManager::new(offline, cache, Arc::new(invoker), SyncConfig::default());
//! manager.add_operation(OperationKind::Create, "/teachers", Some(body), Priority::High)?;
//! let result = manager.sync().await;
//! ```

use futures_util::future::join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use sync_core::{
    Action, Event, FailureOutcome, InvalidationRules, PassPlan, RetryPolicy, SyncState, SyncStatus,
};
use sync_store::{Cache, OfflineStore};
use sync_types::{
    OperationFailure, OperationId, OperationKind, Priority, SyncEvent, SyncOperation, SyncResult,
};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::events::{EventBus, ListenerId};
use crate::invoker::{InvokeError, RemoteInvoker, RemoteRequest};
use crate::timers::{RetryTimers, TimerSlot};

/// Manager errors.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The operation could not be written to the offline queue.
    #[error("failed to persist operation {id} for {endpoint}")]
    Persist {
        /// Id the operation would have had.
        id: OperationId,
        /// Endpoint it targeted.
        endpoint: String,
    },
}

/// Offline-first sync manager.
///
/// Cheap to clone; clones drive the same queue.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    offline: OfflineStore,
    cache: Cache,
    invoker: Arc<dyn RemoteInvoker>,
    config: SyncConfig,
    retry: RetryPolicy,
    rules: InvalidationRules,
    state: Mutex<SyncState>,
    events: EventBus,
    retry_timers: RetryTimers,
    fallback: TimerSlot,
    auto_sync: TimerSlot,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("state", &*self.inner.lock_state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SyncManager {
    /// Create a manager. It starts idle and assumes connectivity.
    pub fn new(
        offline: OfflineStore,
        cache: Cache,
        invoker: Arc<dyn RemoteInvoker>,
        config: SyncConfig,
    ) -> Self {
        let inner = ManagerInner {
            retry: config.retry_policy(),
            rules: config.invalidation_rules(),
            offline,
            cache,
            invoker,
            config,
            state: Mutex::new(SyncState::new(true)),
            events: EventBus::new(),
            retry_timers: RetryTimers::new(),
            fallback: TimerSlot::new(),
            auto_sync: TimerSlot::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Queue a mutation for delivery.
    ///
    /// The operation is persisted before this returns. If the manager is
    /// online and idle, a pass is started in the background.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Persist`] if the queue could not be written.
    pub fn add_operation(
        &self,
        kind: OperationKind,
        endpoint: impl Into<String>,
        payload: Option<Value>,
        priority: Priority,
    ) -> Result<OperationId, ManagerError> {
        let inner = &self.inner;
        let op = SyncOperation::new(
            kind,
            endpoint,
            payload,
            priority,
            inner.offline.store().now_millis(),
        )
        .with_max_attempts(inner.config.max_attempts);

        if !inner.offline.add_to_sync_queue(&op) {
            return Err(ManagerError::Persist {
                id: op.id,
                endpoint: op.endpoint,
            });
        }
        tracing::debug!(id = %op.id, kind = %op.kind, endpoint = %op.endpoint, "operation queued");

        let state = *inner.lock_state();
        if state.is_online() && !state.is_syncing() {
            inner.spawn_pass();
        }
        Ok(op.id)
    }

    /// Run one pass over the queue.
    ///
    /// Returns a skipped result if a pass is already running, the manager is
    /// offline, or nothing is queued. Never fails: every dispatch error is
    /// folded into the result.
    pub async fn sync(&self) -> SyncResult {
        self.inner.sync().await
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.inner.lock_state().status()
    }

    /// Operations waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.inner.offline.sync_queue().len()
    }

    /// Drop every queued operation and its retry timer.
    pub fn clear_pending_operations(&self) -> bool {
        self.inner.retry_timers.cancel_all();
        self.inner.offline.clear_sync_queue()
    }

    /// Record a connectivity change.
    ///
    /// Coming online while idle starts a pass. Going offline never interrupts
    /// a running pass.
    pub fn set_online(&self, online: bool) {
        let event = if online {
            Event::WentOnline
        } else {
            Event::WentOffline
        };
        let actions = self.inner.apply(event);
        if !actions.is_empty() {
            tracing::debug!(online, "connectivity changed");
        }
        self.inner.execute(actions);
    }

    /// Whether connectivity is currently believed available.
    pub fn is_online(&self) -> bool {
        self.inner.lock_state().is_online()
    }

    /// Request a pass every `period`, replacing any earlier schedule.
    ///
    /// The first pass is requested one period from now. A zero period is
    /// ignored.
    pub fn start_auto_sync(&self, period: Duration) {
        self.inner.start_auto_sync(period);
    }

    /// Stop periodic passes. A running pass is not interrupted.
    pub fn stop_auto_sync(&self) {
        if self.inner.auto_sync.cancel() {
            tracing::debug!("auto-sync stopped");
        }
    }

    /// Tear down: stop every timer and clear the queue.
    ///
    /// Calls already in flight are not aborted.
    pub fn destroy(&self) {
        self.stop_auto_sync();
        self.inner.retry_timers.cancel_all();
        self.inner.fallback.cancel();
        self.inner.offline.clear_sync_queue();
        tracing::info!("sync manager destroyed");
    }

    /// Register an event callback.
    pub fn add_event_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(listener)
    }

    /// Unregister an event callback.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.events.remove_listener(id)
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Retry timers that have not fired yet.
    pub fn pending_retries(&self) -> usize {
        self.inner.retry_timers.pending()
    }

    /// Whether a fallback re-sync is waiting to fire.
    pub fn fallback_armed(&self) -> bool {
        self.inner.fallback.is_armed()
    }

    /// The offline queue this manager writes.
    pub fn offline(&self) -> &OfflineStore {
        &self.inner.offline
    }

    /// The cache this manager invalidates.
    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }
}

impl ManagerInner {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feed `event` to the state machine and return the actions to run.
    fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = self.lock_state();
        let (next, actions) = state.on_event(event);
        if next.status() != state.status() {
            tracing::debug!(from = %state.status(), to = %next.status(), "sync status changed");
        }
        *state = next;
        actions
    }

    fn execute(self: &Arc<Self>, actions: Vec<Action>) {
        for action in actions {
            match action {
                // The pass itself is driven by `sync`.
                Action::StartPass => {}
                Action::RequestPass => self.spawn_pass(),
                Action::ScheduleFallback => self.schedule_fallback(),
                Action::CancelFallback => {
                    self.fallback.cancel();
                }
                Action::EmitEvent(event) => self.events.emit(event),
            }
        }
    }

    async fn sync(self: &Arc<Self>) -> SyncResult {
        let snapshot = self.offline.sync_queue();
        let pending = snapshot.len();

        let actions = self.apply(Event::PassRequested { pending });
        if !actions.contains(&Action::StartPass) {
            tracing::debug!(pending, "sync pass skipped");
            return SyncResult::skipped();
        }

        let mut guard = PassGuard {
            manager: self,
            finished: false,
        };
        self.execute(actions);
        tracing::debug!(pending, "sync pass started");

        let result = self.run_pass(snapshot).await;

        guard.finished = true;
        let actions = self.apply(Event::PassFinished {
            failed: result.failed,
        });
        self.execute(actions);

        tracing::info!(
            synced = result.synced,
            failed = result.failed,
            "sync pass finished"
        );
        self.events.emit(SyncEvent::SyncCompleted {
            result: result.clone(),
        });
        result
    }

    async fn run_pass(self: &Arc<Self>, snapshot: Vec<SyncOperation>) -> SyncResult {
        let plan = PassPlan::new(snapshot, self.config.batch_size);
        let total = plan.len();
        let completed = AtomicUsize::new(0);
        let mut result = SyncResult::default();

        for (index, batch) in plan.batches().enumerate() {
            if index > 0 {
                tokio::task::yield_now().await;
            }

            let settled = join_all(
                batch
                    .iter()
                    .cloned()
                    .map(|op| self.settle(op, &completed, total)),
            )
            .await;

            for outcome in settled {
                match outcome {
                    Ok(()) => result.synced += 1,
                    Err(failure) => {
                        result.failed += 1;
                        result.errors.push(failure);
                    }
                }
            }
        }

        result.success = result.failed == 0;
        result
    }

    /// Dispatch one operation and report progress once it settles.
    async fn settle(
        self: &Arc<Self>,
        op: SyncOperation,
        completed: &AtomicUsize,
        total: usize,
    ) -> Result<(), OperationFailure> {
        let outcome = self.dispatch(op).await;
        let completed = completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.events
            .emit(SyncEvent::SyncProgress { completed, total });
        outcome
    }

    async fn dispatch(self: &Arc<Self>, op: SyncOperation) -> Result<(), OperationFailure> {
        let Some(method) = op.kind.method() else {
            let message = format!("unknown operation kind `{}`", op.kind);
            return Err(self.drop_terminal(op, message));
        };

        let timeout = self.config.request_timeout();
        let request = RemoteRequest::new(method, op.endpoint.clone(), op.payload.clone(), timeout);
        tracing::trace!(id = %op.id, %method, endpoint = %op.endpoint, "dispatching");

        let outcome = match tokio::time::timeout(timeout, self.invoker.invoke(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(InvokeError::Timeout),
        };

        match outcome {
            Ok(()) => {
                self.on_delivered(op);
                Ok(())
            }
            Err(e) => Err(self.on_failed(op, e)),
        }
    }

    fn on_delivered(&self, op: SyncOperation) {
        if !self.offline.remove_from_sync_queue(&op.id) {
            tracing::warn!(id = %op.id, "delivered operation still queued, it will be sent again");
        }
        self.retry_timers.cancel(&op.id);

        for resource in self.rules.affected(&op.endpoint) {
            self.cache.invalidate_prefix(resource);
        }

        tracing::debug!(id = %op.id, endpoint = %op.endpoint, "operation delivered");
        self.events
            .emit(SyncEvent::OperationSuccess { operation: op });
    }

    fn on_failed(self: &Arc<Self>, mut op: SyncOperation, error: InvokeError) -> OperationFailure {
        let message = error.to_string();

        let delay = match self.retry.on_failure(&mut op) {
            FailureOutcome::Retry { delay } => delay,
            FailureOutcome::Exhausted => return self.drop_terminal(op, message),
        };

        if !self.offline.update_operation(&op) {
            tracing::warn!(id = %op.id, "attempt count not persisted");
        }
        self.schedule_retry(op.id, delay);

        tracing::warn!(
            id = %op.id,
            endpoint = %op.endpoint,
            attempts = op.attempts,
            max_attempts = op.max_attempts,
            retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %message,
            "operation failed, will retry"
        );

        let failure = OperationFailure {
            id: op.id,
            endpoint: op.endpoint.clone(),
            error: message.clone(),
            terminal: false,
        };
        self.events.emit(SyncEvent::OperationError {
            operation: op,
            error: message,
            will_retry: true,
        });
        failure
    }

    /// Remove `op` for good and report it.
    fn drop_terminal(&self, op: SyncOperation, message: String) -> OperationFailure {
        if !self.offline.remove_from_sync_queue(&op.id) {
            tracing::warn!(id = %op.id, "dropped operation still queued");
        }
        self.retry_timers.cancel(&op.id);

        tracing::error!(
            id = %op.id,
            kind = %op.kind,
            endpoint = %op.endpoint,
            attempts = op.attempts,
            error = %message,
            "operation dropped"
        );

        let failure = OperationFailure {
            id: op.id,
            endpoint: op.endpoint.clone(),
            error: message.clone(),
            terminal: true,
        };
        self.events.emit(SyncEvent::OperationError {
            operation: op,
            error: message,
            will_retry: false,
        });
        failure
    }

    // ===========================================
    // Timers
    // ===========================================

    /// Run a pass on the runtime without waiting for it.
    fn spawn_pass(self: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no runtime, pass not started");
            return;
        };
        let manager = Arc::clone(self);
        runtime.spawn(async move {
            manager.sync().await;
        });
    }

    /// Arm a one-shot timer that requests a pass after `delay`.
    fn pass_timer(
        self: &Arc<Self>,
        delay: Duration,
        reason: &'static str,
    ) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(reason, "no runtime, timer not armed");
            return None;
        };
        let manager = Arc::downgrade(self);
        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                tracing::debug!(reason, "timer fired");
                manager.spawn_pass();
            }
        }))
    }

    fn schedule_retry(self: &Arc<Self>, id: OperationId, delay: Duration) {
        if let Some(handle) = self.pass_timer(delay, "retry") {
            self.retry_timers.schedule(id, handle);
        }
    }

    fn schedule_fallback(self: &Arc<Self>) {
        let delay = self.config.fallback_resync();
        if let Some(handle) = self.pass_timer(delay, "fallback") {
            self.fallback.replace(handle);
            tracing::debug!(delay_ms = self.config.fallback_resync_ms, "fallback re-sync armed");
        }
    }

    fn start_auto_sync(self: &Arc<Self>, period: Duration) {
        if period.is_zero() {
            tracing::warn!("auto-sync period must be non-zero");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no runtime, auto-sync not started");
            return;
        };

        let manager = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.spawn_pass();
            }
        });
        self.auto_sync.replace(handle);
        tracing::info!(period_secs = period.as_secs_f64(), "auto-sync started");
    }
}

/// Settles the state machine if a pass is cancelled mid-flight.
struct PassGuard<'a> {
    manager: &'a Arc<ManagerInner>,
    finished: bool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("sync pass cancelled before completion");
        let actions = self.manager.apply(Event::PassFinished { failed: 1 });
        self.manager.execute(actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::MockInvoker;
    use serde_json::json;
    use sync_store::{Clock, ManualClock, MemoryMedium, Store};

    struct Harness {
        manager: SyncManager,
        invoker: MockInvoker,
        offline: OfflineStore,
        cache: Cache,
        medium: MemoryMedium,
        clock: Arc<ManualClock>,
    }

    fn harness(config: SyncConfig) -> Harness {
        let medium = MemoryMedium::new();
        let clock = Arc::new(ManualClock::new(1_000));
        let store = Store::new(Arc::new(medium.clone()), clock.clone());
        let offline = OfflineStore::new(store.clone());
        let cache = Cache::with_defaults(store);
        let invoker = MockInvoker::new();
        let manager = SyncManager::new(
            offline.clone(),
            cache.clone(),
            Arc::new(invoker.clone()),
            config,
        );
        Harness {
            manager,
            invoker,
            offline,
            cache,
            medium,
            clock,
        }
    }

    impl Harness {
        /// Queue an operation the way an earlier session would have left it.
        fn seed(&self, kind: OperationKind, endpoint: &str, priority: Priority) -> SyncOperation {
            self.clock.advance(Duration::from_millis(1));
            let op = SyncOperation::new(
                kind,
                endpoint,
                Some(json!({"endpoint": endpoint})),
                priority,
                self.clock.now_millis(),
            )
            .with_max_attempts(self.manager.config().max_attempts);
            assert!(self.offline.add_to_sync_queue(&op));
            op
        }

        fn record_events(&self) -> Arc<Mutex<Vec<SyncEvent>>> {
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            self.manager
                .add_event_listener(move |event| sink.lock().unwrap().push(event.clone()));
            events
        }
    }

    fn unavailable() -> InvokeError {
        InvokeError::Status {
            status: 503,
            message: "service unavailable".into(),
        }
    }

    // ===========================================
    // Enqueue and persistence
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn offline_adds_accumulate_and_survive_restart() {
        let h = harness(SyncConfig::default());
        h.manager.set_online(false);

        let first = h
            .manager
            .add_operation(OperationKind::Create, "/teachers", Some(json!({"name": "Ada"})), Priority::High)
            .unwrap();
        h.manager
            .add_operation(OperationKind::Update, "/appointments/1", None, Priority::Medium)
            .unwrap();
        h.manager
            .add_operation(OperationKind::Delete, "/users/2", None, Priority::Low)
            .unwrap();
        assert_eq!(h.manager.pending_count(), 3);

        h.offline.remove_from_sync_queue(&first);
        assert_eq!(h.manager.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.invoker.request_count(), 0);

        let reopened = SyncManager::new(
            OfflineStore::new(Store::new(Arc::new(h.medium.clone()), h.clock.clone())),
            h.cache.clone(),
            Arc::new(MockInvoker::new()),
            SyncConfig::default(),
        );
        assert_eq!(reopened.pending_count(), 2);
    }

    #[tokio::test]
    async fn new_operations_get_fresh_ids_and_configured_budget() {
        let h = harness(SyncConfig::default().with_max_attempts(5));
        h.manager.set_online(false);

        let a = h
            .manager
            .add_operation(OperationKind::Create, "/teachers", None, Priority::Medium)
            .unwrap();
        let b = h
            .manager
            .add_operation(OperationKind::Create, "/teachers", None, Priority::Medium)
            .unwrap();
        assert_ne!(a, b);

        let queue = h.offline.sync_queue();
        assert_eq!(queue[0].id, a);
        assert_eq!(queue[0].attempts, 0);
        assert_eq!(queue[0].max_attempts, 5);
        assert_eq!(queue[0].enqueued_at, h.clock.now_millis());
    }

    #[tokio::test]
    async fn enqueue_reports_persistence_failure() {
        let h = harness(SyncConfig::default());
        h.medium.set_quota(Some(16));

        let result = h
            .manager
            .add_operation(OperationKind::Create, "/teachers", None, Priority::Medium);

        assert!(matches!(result, Err(ManagerError::Persist { .. })));
        assert_eq!(h.manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn online_add_triggers_background_pass() {
        let h = harness(SyncConfig::default());

        h.manager
            .add_operation(OperationKind::Create, "/teachers", None, Priority::Medium)
            .unwrap();
        assert_eq!(h.manager.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.invoker.request_count(), 1);
        assert_eq!(h.manager.pending_count(), 0);
        assert_eq!(h.manager.status(), SyncStatus::Success);
    }

    // ===========================================
    // Pass mechanics
    // ===========================================

    #[tokio::test]
    async fn sync_is_skipped_when_empty_or_offline() {
        let h = harness(SyncConfig::default());

        let empty = h.manager.sync().await;
        assert!(empty.skipped);
        assert!(empty.success);
        assert_eq!(h.manager.status(), SyncStatus::Idle);

        h.seed(OperationKind::Create, "/teachers", Priority::Medium);
        h.manager.set_online(false);
        let offline = h.manager.sync().await;
        assert!(offline.skipped);
        assert_eq!(h.invoker.request_count(), 0);
        assert_eq!(h.manager.pending_count(), 1);
    }

    #[tokio::test]
    async fn dispatch_follows_priority_then_age() {
        let h = harness(SyncConfig::default());
        h.seed(OperationKind::Create, "/low", Priority::Low);
        h.seed(OperationKind::Create, "/high/1", Priority::High);
        h.seed(OperationKind::Create, "/medium", Priority::Medium);
        h.seed(OperationKind::Create, "/high/2", Priority::High);

        let result = h.manager.sync().await;

        assert_eq!(result.synced, 4);
        assert_eq!(h.invoker.paths(), vec!["/high/1", "/high/2", "/medium", "/low"]);
    }

    #[tokio::test]
    async fn kinds_map_to_http_methods() {
        use sync_types::HttpMethod;

        let h = harness(SyncConfig::default());
        h.seed(OperationKind::Create, "/a", Priority::High);
        h.seed(OperationKind::Update, "/b", Priority::Medium);
        h.seed(OperationKind::Delete, "/c", Priority::Low);

        h.manager.sync().await;

        let methods: Vec<HttpMethod> = h.invoker.requests().iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete]);
        assert_eq!(h.invoker.requests()[0].body, Some(json!({"endpoint": "/a"})));
        assert_eq!(h.invoker.requests()[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn seven_operations_run_in_batches_of_five_and_two() {
        let h = harness(SyncConfig::default());
        h.invoker.set_latency(Duration::from_millis(100));
        for i in 0..7 {
            h.seed(OperationKind::Update, &format!("/appointments/{i}"), Priority::Medium);
        }
        let events = h.record_events();

        let start = Instant::now();
        let result = h.manager.sync().await;
        let elapsed = start.elapsed();

        assert_eq!(result.synced, 7);
        assert_eq!(h.invoker.peak_in_flight(), 5);
        assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?}");

        let events = events.lock().unwrap();
        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::SyncProgress { completed, total } => {
                    assert_eq!(*total, 7);
                    Some(*completed)
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress, (1..=7).collect::<Vec<_>>());
        assert_eq!(events.first(), Some(&SyncEvent::SyncStarted { total: 7 }));
        assert!(matches!(events.last(), Some(SyncEvent::SyncCompleted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sync_calls_share_one_pass() {
        let h = harness(SyncConfig::default());
        h.invoker.set_latency(Duration::from_millis(50));
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);

        let (a, b) = tokio::join!(h.manager.sync(), h.manager.sync());

        assert!(a.skipped ^ b.skipped);
        assert_eq!(a.synced + b.synced, 1);
        assert_eq!(h.invoker.request_count(), 1);
    }

    #[tokio::test]
    async fn unknown_kind_is_dropped_without_dispatch() {
        let h = harness(SyncConfig::default());
        h.seed(OperationKind::Unknown("patch".into()), "/teachers/1", Priority::High);
        h.seed(OperationKind::Create, "/teachers", Priority::Low);
        let events = h.record_events();

        let result = h.manager.sync().await;

        assert_eq!(result.synced, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.terminal_failures().count(), 1);
        assert!(result.errors[0].error.contains("patch"));
        assert_eq!(h.invoker.paths(), vec!["/teachers"]);
        assert_eq!(h.manager.pending_count(), 0);
        assert_eq!(h.manager.status(), SyncStatus::Error);
        assert!(events.lock().unwrap().iter().any(|e| matches!(
            e,
            SyncEvent::OperationError {
                will_retry: false,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_counts_as_failure() {
        let h = harness(SyncConfig::default().with_request_timeout(Duration::from_secs(1)));
        h.invoker.set_latency(Duration::from_secs(60));
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);

        let start = Instant::now();
        let result = h.manager.sync().await;

        assert_eq!(result.failed, 1);
        assert!(result.errors[0].error.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(h.offline.sync_queue()[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_does_not_preempt_running_pass() {
        let h = harness(SyncConfig::default());
        h.invoker.set_latency(Duration::from_millis(100));
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);

        let manager = h.manager.clone();
        let pass = tokio::spawn(async move { manager.sync().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.manager.status(), SyncStatus::Syncing);

        h.manager.set_online(false);
        let result = pass.await.unwrap();

        assert_eq!(result.synced, 1);
        assert!(!h.manager.is_online());
        assert_eq!(h.manager.status(), SyncStatus::Success);
    }

    // ===========================================
    // Retry and recovery
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn fail_once_then_succeed_invalidates_cache() {
        let h = harness(SyncConfig::default());
        h.cache.set("teachers:list", &json!([1, 2]), None);
        h.cache.set("users:me", &json!({"id": 9}), None);
        h.invoker.fail_next(1, unavailable());
        let op = h.seed(OperationKind::Create, "/teachers", Priority::High);
        let events = h.record_events();

        let first = h.manager.sync().await;
        assert_eq!(first.failed, 1);
        assert!(!first.errors[0].terminal);
        assert_eq!(h.manager.status(), SyncStatus::Error);
        assert_eq!(h.offline.sync_queue()[0].attempts, 1);
        assert_eq!(h.manager.pending_retries(), 1);

        // Backoff for the first retry is the base delay.
        tokio::time::sleep(Duration::from_millis(1_001)).await;

        assert_eq!(h.invoker.request_count(), 2);
        assert_eq!(h.manager.pending_count(), 0);
        assert_eq!(h.manager.status(), SyncStatus::Success);
        assert!(!h.cache.has("teachers:list"));
        assert!(h.cache.has("users:me"));

        let events = events.lock().unwrap();
        let delivered: Vec<&SyncOperation> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::OperationSuccess { operation } => Some(operation),
                _ => None,
            })
            .collect();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, op.id);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_grow_by_one_until_operation_is_dropped() {
        let h = harness(SyncConfig::default());
        h.invoker.fail_always(InvokeError::Transport("connection refused".into()));
        h.seed(OperationKind::Update, "/appointments/4", Priority::Medium);

        let start = Instant::now();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        h.manager.add_event_listener(move |event| {
            if let SyncEvent::OperationError {
                operation,
                will_retry,
                ..
            } = event
            {
                sink.lock()
                    .unwrap()
                    .push((operation.attempts, *will_retry, start.elapsed()));
            }
        });

        h.manager.sync().await;
        assert_eq!(h.offline.sync_queue()[0].attempts, 1);

        // Retries at +1s and +2s after that.
        tokio::time::sleep(Duration::from_secs(10)).await;

        let failures = failures.lock().unwrap();
        let outcomes: Vec<(u32, bool)> = failures.iter().map(|(a, r, _)| (*a, *r)).collect();
        assert_eq!(outcomes, vec![(1, true), (2, true), (3, false)]);

        let second_gap = failures[1].2 - failures[0].2;
        let third_gap = failures[2].2 - failures[1].2;
        assert!(second_gap >= Duration::from_secs(1) && second_gap < Duration::from_millis(1_050));
        assert!(third_gap >= Duration::from_secs(2) && third_gap < Duration::from_millis(2_050));

        assert_eq!(h.invoker.request_count(), 3);
        assert_eq!(h.manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_schedules_fallback_resync() {
        let config = SyncConfig::default().with_base_retry_delay(Duration::from_secs(3600));
        let h = harness(config);
        h.invoker.fail_next(1, unavailable());
        h.seed(OperationKind::Create, "/reviews", Priority::Medium);

        h.manager.sync().await;
        assert_eq!(h.manager.status(), SyncStatus::Error);
        assert!(h.manager.fallback_armed());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(h.invoker.request_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.invoker.request_count(), 2);
        assert_eq!(h.manager.status(), SyncStatus::Success);
        assert!(!h.manager.fallback_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn coming_online_triggers_pass() {
        let h = harness(SyncConfig::default());
        h.manager.set_online(false);
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);
        let events = h.record_events();

        h.manager.set_online(true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.invoker.request_count(), 1);
        assert_eq!(
            events.lock().unwrap().first(),
            Some(&SyncEvent::NetworkChanged { online: true })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auto_sync_drains_periodically_until_stopped() {
        let h = harness(SyncConfig::default());
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);

        h.manager.start_auto_sync(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.invoker.request_count(), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.invoker.request_count(), 1);

        h.manager.stop_auto_sync();
        h.seed(OperationKind::Create, "/users", Priority::Medium);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.invoker.request_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn adds_during_a_pass_are_kept_and_delivered_ops_stay_gone() {
        let h = harness(SyncConfig::default());
        h.invoker.set_latency(Duration::from_millis(5));
        let seeded: Vec<OperationId> = (0..60)
            .map(|_| h.seed(OperationKind::Create, "/teachers", Priority::Medium).id)
            .collect();

        let manager = h.manager.clone();
        let pass = tokio::spawn(async move { manager.sync().await });
        while h.manager.status() == SyncStatus::Idle {
            tokio::task::yield_now().await;
        }
        h.manager.set_online(false);

        let adders: Vec<_> = (0..4)
            .map(|_| {
                let manager = h.manager.clone();
                tokio::task::spawn_blocking(move || {
                    (0..30)
                        .map(|_| {
                            manager
                                .add_operation(OperationKind::Update, "/users/1", None, Priority::Low)
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut added = Vec::new();
        for adder in adders {
            added.extend(adder.await.unwrap());
        }

        let result = pass.await.unwrap();
        assert_eq!(result.synced, 60);

        let queued: Vec<OperationId> = h.offline.sync_queue().iter().map(|op| op.id).collect();
        assert_eq!(queued.len(), added.len());
        assert!(added.iter().all(|id| queued.contains(id)));
        assert!(seeded.iter().all(|id| !queued.contains(id)));
    }

    // ===========================================
    // Teardown
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn clear_pending_operations_cancels_retries() {
        let h = harness(SyncConfig::default());
        h.invoker.fail_always(unavailable());
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);

        h.manager.sync().await;
        assert_eq!(h.manager.pending_retries(), 1);

        assert!(h.manager.clear_pending_operations());
        assert_eq!(h.manager.pending_count(), 0);
        assert_eq!(h.manager.pending_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_stops_everything() {
        let h = harness(SyncConfig::default());
        h.invoker.fail_always(unavailable());
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);
        h.manager.sync().await;
        h.manager.start_auto_sync(Duration::from_secs(1));

        h.manager.destroy();
        h.seed(OperationKind::Create, "/users", Priority::Medium);
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(h.invoker.request_count(), 1);
        assert_eq!(h.manager.pending_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_manager_stops_retrying() {
        let h = harness(SyncConfig::default());
        h.invoker.fail_always(unavailable());
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);
        h.manager.sync().await;

        let Harness { manager, invoker, .. } = h;
        drop(manager);
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(invoker.request_count(), 1);
    }

    #[tokio::test]
    async fn listeners_and_subscribers_see_pass_events() {
        let h = harness(SyncConfig::default());
        let mut rx = h.manager.subscribe();
        let events = h.record_events();
        h.seed(OperationKind::Create, "/teachers", Priority::Medium);

        h.manager.sync().await;

        assert_eq!(rx.recv().await.unwrap(), SyncEvent::SyncStarted { total: 1 });
        assert!(matches!(
            rx.recv().await.unwrap(),
            SyncEvent::OperationSuccess { .. }
        ));
        assert_eq!(events.lock().unwrap().len(), 4);

        let id = h.manager.add_event_listener(|_| {});
        assert!(h.manager.remove_event_listener(id));
        assert!(!h.manager.remove_event_listener(id));
    }
}
