//! Show queue and storage status.

use anyhow::Result;
use sync_client::SyncEngine;

use super::format_age;

/// Run the status command.
pub fn run(engine: &SyncEngine) -> Result<()> {
    let stats = engine.offline().sync_stats();
    let cache = engine.cache().stats();

    println!("=== offline-sync status ===");
    println!();

    println!("Queue:");
    println!("  Pending:   {}", stats.pending);
    match stats.oldest_pending {
        Some(oldest) => println!("  Oldest:    {}", format_age(oldest)),
        None => println!("  Oldest:    -"),
    }
    println!("  Snapshots: {}", stats.snapshots);

    println!();

    println!("Storage:");
    println!("  Namespace: {}", engine.store().namespace());
    println!("  Entries:   {}", engine.store().keys().len());
    println!("  Usage:     {} bytes", engine.store().usage());
    println!(
        "  Cache:     {} entries, {} bytes",
        cache.entries, cache.usage_bytes
    );

    Ok(())
}
