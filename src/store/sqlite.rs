//! SQLite key-value store.
//!
//! Values are stored as JSON text in a single `kv` table. rusqlite is
//! blocking, so every call runs on the blocking thread pool.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{NotesError, NotesResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Key-value store backed by an embedded SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub async fn open(path: &Path) -> NotesResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> NotesResult<Connection> {
            let conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database
    pub fn in_memory() -> NotesResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> NotesResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> NotesResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| NotesError::Storage("SQLite connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }
}

fn decode(key: &str, raw: &str) -> NotesResult<Value> {
    serde_json::from_str(raw)
        .map_err(|e| NotesError::Storage(format!("Corrupt value for key {}: {}", key, e)))
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_all(&self) -> NotesResult<BTreeMap<String, Value>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut entries = BTreeMap::new();
            for row in rows {
                let (key, raw) = row?;
                let value = decode(&key, &raw)?;
                entries.insert(key, value);
            }
            Ok(entries)
        })
        .await
    }

    async fn get(&self, keys: &[String]) -> NotesResult<BTreeMap<String, Value>> {
        let keys = keys.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
            let mut entries = BTreeMap::new();
            for key in keys {
                let raw: Option<String> = stmt
                    .query_row(params![key], |row| row.get(0))
                    .optional()?;
                if let Some(raw) = raw {
                    let value = decode(&key, &raw)?;
                    entries.insert(key, value);
                }
            }
            Ok(entries)
        })
        .await
    }

    async fn set(&self, entries: BTreeMap<String, Value>) -> NotesResult<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )?;
                for (key, value) in &entries {
                    stmt.execute(params![key, serde_json::to_string(value)?])?;
                }
            }
            tx.commit()?;
            debug!(entries = entries.len(), "SQLite entries written");
            Ok(())
        })
        .await
    }

    async fn remove(&self, keys: &[String]) -> NotesResult<()> {
        let keys = keys.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("DELETE FROM kv WHERE key = ?1")?;
                for key in &keys {
                    stmt.execute(params![key])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn keys(&self) -> NotesResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }
}
