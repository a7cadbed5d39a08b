//! Mock invoker for testing.
//!
//! Records every request, fails on demand and can hold calls open to
//! observe how many run at once.

use super::{InvokeError, RemoteInvoker, RemoteRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mock invoker for testing.
///
/// Clones share state, so a test can keep one handle for assertions and
/// give another to the manager.
#[derive(Debug, Default, Clone)]
pub struct MockInvoker {
    inner: Arc<Mutex<MockInvokerInner>>,
}

#[derive(Debug, Default)]
struct MockInvokerInner {
    requests: Vec<RemoteRequest>,
    fail_next: Option<(usize, InvokeError)>,
    fail_paths: HashMap<String, (usize, InvokeError)>,
    fail_always: Option<InvokeError>,
    latency: Option<Duration>,
    in_flight: usize,
    peak_in_flight: usize,
}

impl MockInvokerInner {
    /// Decide the scripted outcome for a call to `path`.
    fn outcome(&mut self, path: &str) -> Result<(), InvokeError> {
        if let Some(err) = take_scripted(self.fail_paths.get_mut(path)) {
            return Err(err);
        }
        if let Some(err) = take_scripted(self.fail_next.as_mut()) {
            return Err(err);
        }
        match &self.fail_always {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn take_scripted(slot: Option<&mut (usize, InvokeError)>) -> Option<InvokeError> {
    match slot {
        Some((remaining, err)) if *remaining > 0 => {
            *remaining -= 1;
            Some(err.clone())
        }
        _ => None,
    }
}

impl MockInvoker {
    /// Create a mock that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockInvokerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `times` calls (any path) with `error`.
    pub fn fail_next(&self, times: usize, error: InvokeError) {
        self.lock().fail_next = Some((times, error));
    }

    /// Fail the next `times` calls to `path` with `error`.
    pub fn fail_path(&self, path: &str, times: usize, error: InvokeError) {
        self.lock()
            .fail_paths
            .insert(path.to_string(), (times, error));
    }

    /// Fail every call with `error` until [`reset`](Self::reset).
    pub fn fail_always(&self, error: InvokeError) {
        self.lock().fail_always = Some(error);
    }

    /// Hold every call open for `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.lock().requests.clone()
    }

    /// Paths of every request received, in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.path.clone()).collect()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Highest number of calls that were open at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak_in_flight
    }

    /// Clear recorded requests and scripted failures.
    pub fn reset(&self) {
        *self.lock() = MockInvokerInner::default();
    }
}

/// Decrements the in-flight counter even if the call is cancelled.
struct InFlight<'a>(&'a MockInvoker);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

#[async_trait]
impl RemoteInvoker for MockInvoker {
    async fn invoke(&self, request: RemoteRequest) -> Result<(), InvokeError> {
        let (latency, outcome) = {
            let mut inner = self.lock();
            let outcome = inner.outcome(&request.path);
            inner.requests.push(request);
            inner.in_flight += 1;
            inner.peak_in_flight = inner.peak_in_flight.max(inner.in_flight);
            (inner.latency, outcome)
        };
        let _guard = InFlight(self);

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}
