//! Error types for offline-sync.

use thiserror::Error;

/// Errors raised while interpreting offline-sync data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Unknown operation kind name
    #[error("unknown operation kind: {0}")]
    UnknownKind(String),

    /// Unknown priority name
    #[error("unknown priority: {0}")]
    UnknownPriority(String),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}
