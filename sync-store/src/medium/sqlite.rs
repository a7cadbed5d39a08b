//! SQLite storage medium.

use super::StorageMedium;
use crate::error::MediumResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Schema for the key/value table.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// SQLite-backed medium.
///
/// One table, one row per key. Enumeration order is by key.
pub struct SqliteMedium {
    conn: Mutex<Connection>,
}

impl SqliteMedium {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> MediumResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> MediumResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> MediumResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SqliteMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMedium").finish_non_exhaustive()
    }
}

impl StorageMedium for SqliteMedium {
    fn get_item(&self, key: &str) -> MediumResult<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> MediumResult<()> {
        self.conn().execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> MediumResult<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> MediumResult<()> {
        self.conn().execute("DELETE FROM kv", [])?;
        Ok(())
    }

    fn len(&self) -> MediumResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn key(&self, index: usize) -> MediumResult<Option<String>> {
        let offset = i64::try_from(index).unwrap_or(i64::MAX);
        let key = self
            .conn()
            .query_row(
                "SELECT key FROM kv ORDER BY key LIMIT 1 OFFSET ?1",
                params![offset],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    fn keys(&self) -> MediumResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_get_remove() {
        let medium = SqliteMedium::in_memory().unwrap();

        medium.set_item("a", "1").unwrap();
        assert_eq!(medium.get_item("a").unwrap(), Some("1".to_string()));

        medium.set_item("a", "2").unwrap();
        assert_eq!(medium.get_item("a").unwrap(), Some("2".to_string()));

        medium.remove_item("a").unwrap();
        assert_eq!(medium.get_item("a").unwrap(), None);
    }

    #[test]
    fn enumeration_is_ordered_by_key() {
        let medium = SqliteMedium::in_memory().unwrap();
        medium.set_item("c", "3").unwrap();
        medium.set_item("a", "1").unwrap();
        medium.set_item("b", "2").unwrap();

        assert_eq!(medium.len().unwrap(), 3);
        assert_eq!(medium.key(1).unwrap(), Some("b".to_string()));
        assert_eq!(medium.key(3).unwrap(), None);
        assert_eq!(medium.keys().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn clear_removes_everything() {
        let medium = SqliteMedium::in_memory().unwrap();
        medium.set_item("a", "1").unwrap();
        medium.clear().unwrap();
        assert!(medium.is_empty().unwrap());
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let medium = SqliteMedium::open(&path).unwrap();
            medium.set_item("queue", "[]").unwrap();
        }

        let reopened = SqliteMedium::open(&path).unwrap();
        assert_eq!(reopened.get_item("queue").unwrap(), Some("[]".to_string()));
    }
}
