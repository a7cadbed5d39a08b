//! Drain the queue against a scripted in-process endpoint.
//!
//! There is no real server behind the CLI. `simulate` brings the manager
//! online with a [`MockInvoker`] that can be told to fail or stall, and
//! reports every pass the manager runs.

use anyhow::{bail, Result};
use std::time::Duration;
use sync_client::{InvokeError, MockInvoker, SyncEngine};
use sync_types::{SyncEvent, SyncResult};
use tokio::sync::broadcast::error::RecvError;

/// How the scripted endpoint behaves.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    /// Fail this many calls with a 503 before succeeding.
    pub fail: usize,
    /// Hold every call open this long.
    pub latency: Option<Duration>,
    /// Keep going through retries until the queue is empty.
    pub drain: bool,
    /// Give up waiting after this long.
    pub timeout: Duration,
}

/// Run the simulate command. Returns the result of every pass observed.
pub async fn run(
    engine: &SyncEngine,
    invoker: &MockInvoker,
    options: SimulateOptions,
) -> Result<Vec<SyncResult>> {
    let manager = engine.manager();
    let pending = manager.pending_count();
    if pending == 0 {
        println!("Queue is empty.");
        return Ok(Vec::new());
    }

    if options.fail > 0 {
        invoker.fail_next(
            options.fail,
            InvokeError::Status {
                status: 503,
                message: "service unavailable".into(),
            },
        );
    }
    if let Some(latency) = options.latency {
        invoker.set_latency(latency);
    }

    println!("Syncing {} pending operation(s)...", pending);

    let mut events = manager.subscribe();
    let mut results = Vec::new();
    manager.set_online(true);

    let waited = tokio::time::timeout(options.timeout, async {
        loop {
            match events.recv().await {
                Ok(SyncEvent::SyncCompleted { result }) => {
                    report(results.len() + 1, &result);
                    results.push(result);
                    if !options.drain || manager.pending_count() == 0 {
                        break;
                    }
                }
                Ok(SyncEvent::OperationError {
                    operation,
                    error,
                    will_retry: true,
                }) => {
                    println!(
                        "  retrying {} {} (attempt {}/{}): {}",
                        operation.kind,
                        operation.endpoint,
                        operation.attempts,
                        operation.max_attempts,
                        error
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
    .await;

    manager.set_online(false);

    if waited.is_err() {
        bail!(
            "Timed out after {:?} with {} operation(s) still pending",
            options.timeout,
            manager.pending_count()
        );
    }

    println!();
    println!("{} operation(s) still pending", manager.pending_count());
    let retries = manager.pending_retries();
    if retries > 0 || manager.fallback_armed() {
        println!(
            "{} retry timer(s) armed, fallback re-sync {}",
            retries,
            if manager.fallback_armed() { "armed" } else { "idle" }
        );
    }
    Ok(results)
}

fn report(pass: usize, result: &SyncResult) {
    println!(
        "Pass {}: {} synced, {} failed",
        pass, result.synced, result.failed
    );
    for failure in result.terminal_failures() {
        println!("  dropped {}: {}", failure.endpoint, failure.error);
    }
}
