//! Key-value persistence backends.
//!
//! The notes library persists everything as JSON values under string keys
//! (see [`keys`]). Backends implement [`KeyValueStore`]:
//!
//! - `MemoryStore`: in-process map, used by tests
//! - `JsonFileStore`: a single JSON object on disk, locked per mutation
//! - `SqliteStore`: a `kv` table in an embedded SQLite database

pub mod file;
pub mod keys;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::NotesResult;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Asynchronous mapping from string keys to JSON values
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Every entry in the store
    async fn get_all(&self) -> NotesResult<BTreeMap<String, Value>>;

    /// Entries for the given keys; missing keys are absent from the result
    async fn get(&self, keys: &[String]) -> NotesResult<BTreeMap<String, Value>>;

    /// Insert or overwrite entries
    async fn set(&self, entries: BTreeMap<String, Value>) -> NotesResult<()>;

    /// Remove entries; missing keys are ignored
    async fn remove(&self, keys: &[String]) -> NotesResult<()>;

    /// Every key in the store
    async fn keys(&self) -> NotesResult<Vec<String>> {
        Ok(self.get_all().await?.into_keys().collect())
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Single JSON document on disk
    #[default]
    Json,

    /// Embedded SQLite database
    Sqlite,
}

impl StoreBackend {
    /// Default file name of the backend under the home directory
    pub fn default_file_name(&self) -> &'static str {
        match self {
            StoreBackend::Json => "store.json",
            StoreBackend::Sqlite => "store.sqlite",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Json => write!(f, "json"),
            StoreBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StoreBackend::Json),
            "sqlite" | "sqlite3" | "db" => Ok(StoreBackend::Sqlite),
            _ => anyhow::bail!("Unknown store backend: {}", s),
        }
    }
}

/// Open the store at `path` with the given backend
pub async fn open_store(backend: StoreBackend, path: &Path) -> NotesResult<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match backend {
        StoreBackend::Json => Arc::new(JsonFileStore::open(path).await?),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(path).await?),
    };

    debug!(backend = store.name(), path = %path.display(), "Store opened");
    Ok(store)
}
