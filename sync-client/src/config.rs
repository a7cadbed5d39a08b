//! Sync manager configuration.

use serde::Deserialize;
use std::time::Duration;
use sync_core::{
    InvalidationRules, RetryPolicy, DEFAULT_BATCH_SIZE, DEFAULT_RESOURCES, FALLBACK_RESYNC_DELAY,
};
use sync_types::DEFAULT_MAX_ATTEMPTS;

/// Configuration for [`SyncManager`](crate::SyncManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Operations dispatched concurrently per batch (default: 5).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Deadline for one remote call in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Delay before the first retry in milliseconds (default: 1000).
    /// Each further retry doubles it.
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
    /// Failed dispatches allowed per operation (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay of the re-sync that follows a failed pass, in milliseconds
    /// (default: 300000).
    #[serde(default = "default_fallback_resync_ms")]
    pub fallback_resync_ms: u64,
    /// Resource names whose cache entries a delivered operation invalidates.
    #[serde(default = "default_invalidation_resources")]
    pub invalidation_resources: Vec<String>,
}

// Default value functions
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_base_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_fallback_resync_ms() -> u64 {
    u64::try_from(FALLBACK_RESYNC_DELAY.as_millis()).unwrap_or(300_000)
}

fn default_invalidation_resources() -> Vec<String> {
    DEFAULT_RESOURCES.iter().map(|r| r.to_string()).collect()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            request_timeout_ms: default_request_timeout_ms(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            max_attempts: default_max_attempts(),
            fallback_resync_ms: default_fallback_resync_ms(),
            invalidation_resources: default_invalidation_resources(),
        }
    }
}

impl SyncConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the per-call deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_millis(timeout);
        self
    }

    /// Set the first retry delay.
    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay_ms = duration_millis(delay);
        self
    }

    /// Set the retry budget for new operations.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay of the re-sync that follows a failed pass.
    pub fn with_fallback_resync(mut self, delay: Duration) -> Self {
        self.fallback_resync_ms = duration_millis(delay);
        self
    }

    /// Add a resource name to the invalidation rules.
    pub fn with_invalidation_resource(mut self, resource: impl Into<String>) -> Self {
        self.invalidation_resources.push(resource.into());
        self
    }

    /// Per-call deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Fallback re-sync delay.
    pub fn fallback_resync(&self) -> Duration {
        Duration::from_millis(self.fallback_resync_ms)
    }

    /// Backoff policy built from the base delay.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.base_retry_delay_ms))
    }

    /// Invalidation rules built from the resource list.
    pub fn invalidation_rules(&self) -> InvalidationRules {
        InvalidationRules::new(self.invalidation_resources.iter().cloned())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Periodic store cleanup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 3600 = 1 hour).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl CleanupConfig {
    /// Cleanup interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
