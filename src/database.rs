use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{KeyValueStore, StorageError};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Database connection lock was poisoned")]
    Poisoned,
}

/// SQLite-backed key-value store. Each key holds one UTF-8 JSON document,
/// mirroring the layout a browser keeps in `localStorage`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!(path = %db_path.display(), "opened database");

        let db = Database { conn: Mutex::new(conn) };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS storage (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    /// Read the value stored under `key`
    pub fn get_item(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM storage WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or overwrite the value stored under `key`
    pub fn set_item(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![
                key,
                value,
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        tx.commit()?;
        debug!(key, bytes = value.len(), "stored item");
        Ok(())
    }

    /// Delete the entry for `key`; missing keys are not an error
    pub fn remove_item(&self, key: &str) -> Result<(), DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM storage WHERE key = ?1", rusqlite::params![key])?;
        tx.commit()?;
        debug!(key, removed, "removed item");
        Ok(())
    }

    /// All stored keys in ascending order
    pub fn keys(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM storage ORDER BY key ASC")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl KeyValueStore for Database {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(Database::get_item(self, key)?)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(Database::set_item(self, key, value)?)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        Ok(Database::remove_item(self, key)?)
    }
}
