//! Typed access to notes and video metadata.
//!
//! [`NoteRepository`] hides the key naming of the underlying store. The
//! key-value implementation also hands out per-video locks so that
//! read-modify-write sequences on one video never interleave, even when
//! several handlers share the repository.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::{Note, VideoMetadata};
use crate::error::{NotesError, NotesResult};
use crate::store::keys::{self, meta_key, notes_key};
use crate::store::KeyValueStore;

/// Guard held for the duration of a read-modify-write on one video
pub type VideoGuard = OwnedMutexGuard<()>;

/// Repository of per-video note collections and metadata
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Ids of every video with a stored note collection
    async fn list_video_ids(&self) -> NotesResult<Vec<String>>;

    /// Notes of a video in stored order; empty when none exist
    async fn get_notes(&self, video_id: &str) -> NotesResult<Vec<Note>>;

    /// Replace the notes of a video. An empty collection deletes the video.
    async fn put_notes(&self, video_id: &str, notes: &[Note]) -> NotesResult<()>;

    /// Metadata of a video, if any
    async fn get_metadata(&self, video_id: &str) -> NotesResult<Option<VideoMetadata>>;

    /// Replace the metadata of a video
    async fn put_metadata(&self, video_id: &str, metadata: &VideoMetadata) -> NotesResult<()>;

    /// Remove the notes and metadata of a video
    async fn delete_video(&self, video_id: &str) -> NotesResult<()>;

    /// Every note collection and metadata record, keyed by video id
    async fn snapshot(&self) -> NotesResult<LibrarySnapshot>;

    /// Exclusive access to one video for a read-modify-write sequence
    async fn lock_video(&self, video_id: &str) -> VideoGuard;
}

/// Raw repository contents, the input of aggregation
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    pub notes: BTreeMap<String, Vec<Note>>,
    pub metadata: BTreeMap<String, VideoMetadata>,
}

/// [`NoteRepository`] over a flat [`KeyValueStore`]
pub struct KvNoteRepository {
    store: Arc<dyn KeyValueStore>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KvNoteRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn video_lock(&self, video_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop locks nobody holds so the map does not grow without bound
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(video_id.to_string()).or_default())
    }
}

fn decode_notes(key: &str, value: Value) -> NotesResult<Vec<Note>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value)
        .map_err(|e| NotesError::Storage(format!("Corrupt notes under {}: {}", key, e)))
}

fn decode_metadata(key: &str, value: Value) -> NotesResult<VideoMetadata> {
    serde_json::from_value(value)
        .map_err(|e| NotesError::Storage(format!("Corrupt metadata under {}: {}", key, e)))
}

#[async_trait]
impl NoteRepository for KvNoteRepository {
    async fn list_video_ids(&self) -> NotesResult<Vec<String>> {
        Ok(self
            .store
            .keys()
            .await?
            .iter()
            .filter_map(|k| keys::video_id_from_notes_key(k))
            .map(String::from)
            .collect())
    }

    async fn get_notes(&self, video_id: &str) -> NotesResult<Vec<Note>> {
        let key = notes_key(video_id);
        match self.store.get(std::slice::from_ref(&key)).await?.remove(&key) {
            Some(value) => decode_notes(&key, value),
            None => Ok(Vec::new()),
        }
    }

    async fn put_notes(&self, video_id: &str, notes: &[Note]) -> NotesResult<()> {
        if notes.is_empty() {
            return self.delete_video(video_id).await;
        }

        let key = notes_key(video_id);
        let value = serde_json::to_value(notes)?;
        self.store.set(BTreeMap::from([(key, value)])).await?;
        debug!(video_id, notes = notes.len(), "Notes written");
        Ok(())
    }

    async fn get_metadata(&self, video_id: &str) -> NotesResult<Option<VideoMetadata>> {
        let key = meta_key(video_id);
        self.store
            .get(std::slice::from_ref(&key))
            .await?
            .remove(&key)
            .map(|value| decode_metadata(&key, value))
            .transpose()
    }

    async fn put_metadata(&self, video_id: &str, metadata: &VideoMetadata) -> NotesResult<()> {
        let value = serde_json::to_value(metadata)?;
        self.store
            .set(BTreeMap::from([(meta_key(video_id), value)]))
            .await
    }

    async fn delete_video(&self, video_id: &str) -> NotesResult<()> {
        self.store
            .remove(&[notes_key(video_id), meta_key(video_id)])
            .await?;
        debug!(video_id, "Video removed");
        Ok(())
    }

    async fn snapshot(&self) -> NotesResult<LibrarySnapshot> {
        let mut snapshot = LibrarySnapshot::default();

        for (key, value) in self.store.get_all().await? {
            if let Some(id) = keys::video_id_from_notes_key(&key) {
                let notes = decode_notes(&key, value)?;
                snapshot.notes.insert(id.to_string(), notes);
            } else if let Some(id) = keys::video_id_from_meta_key(&key) {
                let metadata = decode_metadata(&key, value)?;
                snapshot.metadata.insert(id.to_string(), metadata);
            }
        }

        Ok(snapshot)
    }

    async fn lock_video(&self, video_id: &str) -> VideoGuard {
        self.video_lock(video_id).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VideoIdentity;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn repo_with(store: MemoryStore) -> KvNoteRepository {
        KvNoteRepository::new(Arc::new(store))
    }

    fn note(video: &VideoIdentity, time: f64) -> Note {
        Note::new(video, time, "text", ["tag"]).unwrap()
    }

    #[tokio::test]
    async fn test_notes_round_trip_through_store() {
        let repo = repo_with(MemoryStore::new());
        let video = VideoIdentity::new("abc", "Title", "https://youtube.com/watch?v=abc");

        repo.put_notes("abc", &[note(&video, 5.0), note(&video, 1.0)])
            .await
            .unwrap();

        let notes = repo.get_notes("abc").await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].time, 5.0);
        assert_eq!(repo.list_video_ids().await.unwrap(), vec!["abc".to_string()]);

        let raw = repo.store().get_all().await.unwrap();
        assert!(raw.contains_key("timestamps_abc"));
    }

    #[tokio::test]
    async fn test_empty_put_deletes_video() {
        let repo = repo_with(MemoryStore::new());
        let video = VideoIdentity::new("abc", "Title", "");

        repo.put_notes("abc", &[note(&video, 1.0)]).await.unwrap();
        repo.put_metadata("abc", &VideoMetadata::new(&video))
            .await
            .unwrap();

        repo.put_notes("abc", &[]).await.unwrap();
        assert!(repo.store().get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_skips_foreign_keys() {
        let store = MemoryStore::with_entries(BTreeMap::from([
            ("settings".to_string(), json!({"theme": "dark"})),
            ("video_meta_x".to_string(), json!({"videoId": "x", "tags": ["a"]})),
            ("timestamps_y".to_string(), Value::Null),
        ]));
        let repo = repo_with(store);

        let snapshot = repo.snapshot().await.unwrap();
        assert_eq!(snapshot.metadata.len(), 1);
        assert_eq!(snapshot.notes.get("y").map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_corrupt_notes_surface_as_storage_error() {
        let store = MemoryStore::with_entries(BTreeMap::from([(
            "timestamps_x".to_string(),
            json!("not a list"),
        )]));
        let repo = repo_with(store);

        assert!(matches!(
            repo.get_notes("x").await,
            Err(NotesError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_video_lock_serializes_holders() {
        let repo = Arc::new(repo_with(MemoryStore::new()));

        let guard = repo.lock_video("abc").await;

        let contender = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let _guard = repo.lock_video("abc").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // Other videos are not blocked
        let _other = repo.lock_video("xyz").await;

        drop(guard);
        contender.await.unwrap();
    }
}
