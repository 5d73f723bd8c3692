//! JSON file key-value store.
//!
//! The whole store is one pretty-printed JSON object. Mutations take an
//! exclusive lock on a sibling `.lock` file, re-read the document, apply the
//! change and atomically replace the file, so concurrent processes never
//! lose each other's writes.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{NotesError, NotesResult};

/// Key-value store persisted as a single JSON document
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Path to the JSON document
    path: PathBuf,

    /// Path to the advisory lock file
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    pub async fn open(path: &Path) -> NotesResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");

        Ok(Self {
            path: path.to_path_buf(),
            lock_path: path.with_file_name(lock_name),
        })
    }

    /// Path to the JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> NotesResult<BTreeMap<String, Value>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        parse_document(&content, &self.path)
    }

    /// Run `apply` against the current document under the file lock and
    /// write the result back
    async fn mutate<F>(&self, apply: F) -> NotesResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, Value>) + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || mutate_locked(&path, &lock_path, apply)).await?
    }
}

fn parse_document(content: &str, path: &Path) -> NotesResult<BTreeMap<String, Value>> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    match serde_json::from_str::<Value>(content)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(NotesError::Storage(format!(
            "Store file is not a JSON object: {}",
            path.display()
        ))),
    }
}

fn mutate_locked<F>(path: &Path, lock_path: &Path, apply: F) -> NotesResult<()>
where
    F: FnOnce(&mut BTreeMap<String, Value>),
{
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    FileExt::lock_exclusive(&lock_file)?;

    let result = (|| -> NotesResult<()> {
        let mut entries = if path.exists() {
            parse_document(&std::fs::read_to_string(path)?, path)?
        } else {
            BTreeMap::new()
        };

        apply(&mut entries);

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &entries)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| NotesError::Io(e.error))?;

        debug!(path = %path.display(), entries = entries.len(), "Store written");
        Ok(())
    })();

    let _ = FileExt::unlock(&lock_file);
    result
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn get_all(&self) -> NotesResult<BTreeMap<String, Value>> {
        self.load().await
    }

    async fn get(&self, keys: &[String]) -> NotesResult<BTreeMap<String, Value>> {
        let mut entries = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|k| entries.remove_entry(k))
            .collect())
    }

    async fn set(&self, entries: BTreeMap<String, Value>) -> NotesResult<()> {
        self.mutate(move |doc| doc.extend(entries)).await
    }

    async fn remove(&self, keys: &[String]) -> NotesResult<()> {
        let keys = keys.to_vec();
        self.mutate(move |doc| {
            for key in &keys {
                doc.remove(key);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(&temp.path().join("store.json"))
            .await
            .unwrap();

        assert!(store.get_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("store.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .set(BTreeMap::from([
                ("timestamps_a".to_string(), json!([{"id": "1"}])),
                ("video_meta_a".to_string(), json!({"videoId": "a"})),
            ]))
            .await
            .unwrap();
        store.remove(&["video_meta_a".to_string()]).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["timestamps_a"], json!([{"id": "1"}]));
        assert!(temp.path().join("nested").join("store.json.lock").exists());
    }

    #[tokio::test]
    async fn test_rejects_non_object_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(matches!(
            store.get_all().await,
            Err(NotesError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_lose_updates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = JsonFileStore::open(&path).await.unwrap();
            handles.push(tokio::spawn(async move {
                store
                    .set(BTreeMap::from([(format!("key{}", i), json!(i))]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 8);
    }
}
