//! Background cleanup task for expired store entries.
//!
//! Runs periodically to evict entries that have exceeded their TTL, so
//! entries nobody reads again do not linger on disk.

use crate::config::CleanupConfig;
use sync_store::Store;
use tokio::time::{interval_at, Instant};

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task. The first sweep
/// runs one interval after the call.
pub fn spawn_cleanup_task(store: Store, config: CleanupConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("cleanup task disabled");
            return;
        }

        let period = config.interval();
        tracing::info!(interval_secs = config.interval_secs, "cleanup task started");

        let mut timer = interval_at(Instant::now() + period, period);

        loop {
            timer.tick().await;

            let removed = store.cleanup();
            if removed > 0 {
                tracing::info!(removed, "cleanup: evicted expired entries");
            } else {
                tracing::debug!("cleanup: nothing expired");
            }
        }
    })
}
