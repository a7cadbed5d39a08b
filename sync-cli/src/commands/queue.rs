//! List pending operations in dispatch order.

use anyhow::Result;
use sync_client::SyncEngine;
use sync_core::dispatch_order;

use super::format_age;

/// Run the queue command.
pub fn run(engine: &SyncEngine, json: bool) -> Result<()> {
    let ops = dispatch_order(engine.offline().sync_queue());

    if json {
        println!("{}", serde_json::to_string_pretty(&ops)?);
        return Ok(());
    }

    if ops.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!(
        "{:<4} {:<8} {:<8} {:<9} {:<16} ENDPOINT",
        "#", "PRIORITY", "KIND", "ATTEMPTS", "QUEUED"
    );
    for (i, op) in ops.iter().enumerate() {
        let attempts = format!("{}/{}", op.attempts, op.max_attempts);
        println!(
            "{:<4} {:<8} {:<8} {:<9} {:<16} {}",
            i + 1,
            op.priority,
            op.kind,
            attempts,
            format_age(op.enqueued_at),
            op.endpoint
        );
    }
    println!();
    println!("{} pending", ops.len());

    Ok(())
}
