//! Queue a new operation.

use anyhow::{Context, Result};
use serde_json::Value;
use sync_client::SyncEngine;
use sync_types::{OperationId, OperationKind, Priority};

/// Run the enqueue command.
pub fn run(
    engine: &SyncEngine,
    kind: &str,
    endpoint: &str,
    payload: Option<&str>,
    priority: &str,
) -> Result<OperationId> {
    let kind: OperationKind = kind.parse()?;
    let priority: Priority = priority.parse()?;
    let payload: Option<Value> = payload
        .map(serde_json::from_str)
        .transpose()
        .context("Payload is not valid JSON")?;

    let id = engine
        .manager()
        .add_operation(kind.clone(), endpoint, payload, priority)?;

    println!("Queued {} {} ({})", kind, endpoint, priority);
    println!("  ID: {}", id);

    Ok(id)
}
