//! Error types for sync-store.

/// Storage medium errors.
#[derive(Debug, thiserror::Error)]
pub enum MediumError {
    /// The medium has no room for the write.
    #[error("storage quota exceeded: {needed} bytes needed (quota: {quota} bytes)")]
    QuotaExceeded {
        /// Bytes the medium would hold after the write.
        needed: usize,
        /// Configured quota in bytes.
        quota: usize,
    },

    /// The medium could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Store layer errors.
///
/// These stay inside the store: public [`Store`](crate::Store) methods log
/// them and return `false`/`None`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Medium error.
    #[error("medium error: {0}")]
    Medium(#[from] MediumError),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for medium operations.
pub type MediumResult<T> = std::result::Result<T, MediumError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
