//! Storage medium abstraction for offline-sync.
//!
//! A medium is a synchronous, string-keyed key/value space shaped after
//! browser storage: get/set/remove/clear plus `len` and key-by-index
//! enumeration. The [`Store`](crate::Store) layers TTLs and JSON on top.
//!
//! # Implementations
//!
//! - [`MemoryMedium`] - in-memory map with an optional byte quota (tests)
//! - [`SqliteMedium`] - single-table SQLite database (production)

mod memory;
mod sqlite;

pub use memory::MemoryMedium;
pub use sqlite::SqliteMedium;

use crate::error::MediumResult;

/// Trait for synchronous string-keyed storage.
///
/// Implementations must be usable from several owners at once
/// (`Arc<dyn StorageMedium>`), so mutation goes through `&self`.
pub trait StorageMedium: Send + Sync {
    /// Read the value stored under `key`.
    fn get_item(&self, key: &str) -> MediumResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> MediumResult<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> MediumResult<()>;

    /// Delete every key in the medium.
    fn clear(&self) -> MediumResult<()>;

    /// Number of stored keys.
    fn len(&self) -> MediumResult<usize>;

    /// The key at `index` in the medium's enumeration order.
    fn key(&self, index: usize) -> MediumResult<Option<String>>;

    /// Check if the medium holds no keys.
    fn is_empty(&self) -> MediumResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every stored key.
    ///
    /// The default walks [`key`](Self::key) by index; backends with a
    /// cheaper listing should override it.
    fn keys(&self) -> MediumResult<Vec<String>> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key(index)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
