//! CLI command implementations.

pub mod clear;
pub mod cleanup;
pub mod enqueue;
pub mod export;
pub mod import;
pub mod queue;
pub mod simulate;
pub mod status;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use sync_client::{RemoteInvoker, SyncEngine};
use sync_store::{SqliteMedium, SystemClock};

use crate::config::Config;

/// Database file inside the data directory.
pub const DB_FILE: &str = "offline-sync.db";

/// Open the SQLite-backed engine in `data_dir`.
///
/// The manager starts offline: only `simulate` ever drains the queue.
pub fn open_engine(
    data_dir: &Path,
    config: &Config,
    invoker: Arc<dyn RemoteInvoker>,
) -> Result<SyncEngine> {
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    let path = data_dir.join(DB_FILE);
    let medium = SqliteMedium::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;

    let engine = SyncEngine::new(
        Arc::new(medium),
        Arc::new(SystemClock),
        invoker,
        &config.store,
        config.sync.clone(),
    );
    engine.manager().set_online(false);
    Ok(engine)
}

/// Format a millisecond Unix timestamp relative to now.
pub fn format_age(millis: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let diff = now.saturating_sub(millis / 1000);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use sync_client::MockInvoker;

    #[test]
    fn format_age_works() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        assert_eq!(format_age(now), "just now");
        assert!(format_age(now - 120_000).contains("minutes"));
        assert!(format_age(now - 7_200_000).contains("hours"));
        assert!(format_age(now - 172_800_000).contains("days"));
    }

    #[tokio::test]
    async fn open_engine_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");

        let engine = open_engine(&data_dir, &Config::default(), Arc::new(MockInvoker::new())).unwrap();

        assert!(data_dir.join(DB_FILE).exists());
        assert!(!engine.manager().is_online());
    }
}
