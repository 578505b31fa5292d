use crate::dlog;
use crate::error::{Result, WorkoutError};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// String-keyed slot that survives between sessions.
pub trait DurableStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Store backed by a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let shown = path.display();
        let conn = Connection::open(path)
            .map_err(|e| WorkoutError::StorageUnavailable(format!("opening {shown}: {e}")))?;
        tracing::info!(path = %shown, "opened workout store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS kv_store (
              key         text PRIMARY KEY NOT NULL,
              value       text NOT NULL,
              updated_at  text NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )
        .map_err(unavailable)?;
        Ok(Self { conn })
    }
}

impl DurableStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(unavailable)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                r"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES (?1, ?2, datetime('now'))
                ON CONFLICT (key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                [key, value],
            )
            .map_err(unavailable)?;
        dlog!("stored key={key} bytes={}", value.len());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(unavailable)?;
        Ok(())
    }
}

/// Store that forgets everything when dropped. Used when the durable store
/// cannot be reached.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}

/// Stand-in for a store that failed to open. Every call reports the original
/// failure.
#[derive(Debug)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(err: &WorkoutError) -> Self {
        Self {
            reason: err.to_string(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(WorkoutError::StorageUnavailable(self.reason.clone()))
    }
}

impl DurableStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        self.fail()
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
        self.fail()
    }

    fn remove(&mut self, _key: &str) -> Result<()> {
        self.fail()
    }
}

fn unavailable(e: rusqlite::Error) -> WorkoutError {
    WorkoutError::StorageUnavailable(e.to_string())
}
