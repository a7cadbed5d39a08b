//! Evict expired entries now.

use anyhow::Result;
use sync_client::SyncEngine;

/// Run the cleanup command. Returns the number of entries removed.
pub fn run(engine: &SyncEngine) -> Result<usize> {
    let removed = engine.store().cleanup();
    println!("Removed {} expired entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(removed)
}
