//! Portable JSON export and import of the library.
//!
//! Two document shapes exist:
//!
//! ```text
//! single video:  { video: {...}, timestamps: [Note...], exportedAt }
//! full library:  { videos: [{...}], allTimestamps: { "timestamps_<id>": [Note...] },
//!                  exportedAt, version: "2.0" }
//! ```
//!
//! Import detects the shape and validates the whole document before the
//! first write, so a rejected document never leaves partial state behind.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{Note, VideoEntity, VideoMetadata};
use crate::error::{NotesError, NotesResult};
use crate::repository::NoteRepository;
use crate::store::keys;

/// Version stamped on full-library exports
pub const LIBRARY_FORMAT_VERSION: &str = "2.0";

/// Version assumed for documents without a `version` field
pub const LEGACY_FORMAT_VERSION: &str = "1.0";

/// Video-level fields carried by export documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub video_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Record for an aggregated entity; `updated_at` comes from stored
    /// metadata only, so re-import does not invent a timestamp
    pub fn from_entity(entity: &VideoEntity, metadata: Option<&VideoMetadata>) -> Self {
        Self {
            video_id: entity.video_id.clone(),
            title: entity.title.clone(),
            url: entity.url.clone(),
            tags: entity.tags.clone(),
            note_count: Some(entity.note_count),
            updated_at: metadata.and_then(|m| m.updated_at),
        }
    }

    /// Metadata written for this record on import
    pub fn to_metadata(&self, note_count: usize) -> VideoMetadata {
        VideoMetadata {
            video_id: self.video_id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
            tags: self.tags.clone(),
            note_count,
            updated_at: self.updated_at,
        }
    }
}

/// Export of a single video and its notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoExport {
    pub video: VideoRecord,
    pub timestamps: Vec<Note>,
    pub exported_at: DateTime<Utc>,
}

impl VideoExport {
    /// Export `entity` with its notes in stored order
    pub fn new(entity: &VideoEntity, metadata: Option<&VideoMetadata>) -> Self {
        Self {
            video: VideoRecord::from_entity(entity, metadata),
            timestamps: entity.timestamps.clone(),
            exported_at: Utc::now(),
        }
    }

    /// Suggested download file name
    pub fn file_name(&self) -> String {
        format!(
            "video-notes-{}-{}.json",
            self.video.video_id,
            self.exported_at.timestamp_millis()
        )
    }
}

/// Export of every video in the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryExport {
    pub videos: Vec<VideoRecord>,

    /// Note collections keyed by their store key (`timestamps_<id>`)
    pub all_timestamps: BTreeMap<String, Vec<Note>>,

    pub exported_at: DateTime<Utc>,

    pub version: String,
}

impl LibraryExport {
    pub fn new(entities: &[VideoEntity], metadata: &BTreeMap<String, VideoMetadata>) -> Self {
        Self {
            videos: entities
                .iter()
                .map(|e| VideoRecord::from_entity(e, metadata.get(&e.video_id)))
                .collect(),
            all_timestamps: entities
                .iter()
                .map(|e| (keys::notes_key(&e.video_id), e.timestamps.clone()))
                .collect(),
            exported_at: Utc::now(),
            version: LIBRARY_FORMAT_VERSION.to_string(),
        }
    }

    /// Suggested download file name
    pub fn file_name(&self) -> String {
        format!("video-notes-all-{}.json", self.exported_at.timestamp_millis())
    }
}

/// Which export shape an imported document had
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ImportShape {
    /// Single-video export
    Single,

    /// Full-library export with its format version
    Library { version: String },
}

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub shape: ImportShape,

    /// Video ids whose notes were written
    pub video_ids: Vec<String>,

    /// Total notes written
    pub notes: usize,
}

/// A validated import document, ready to be written
#[derive(Debug, Clone)]
pub enum ImportDocument {
    Single {
        video: VideoRecord,
        notes: Vec<Note>,
    },
    Library {
        version: String,
        /// Note collections by video id
        collections: BTreeMap<String, Vec<Note>>,
        /// Video records that also have a collection in the document
        records: Vec<VideoRecord>,
    },
}

fn present<'a>(doc: &'a serde_json::Map<String, Value>, field: &str) -> Option<&'a Value> {
    doc.get(field).filter(|v| !v.is_null())
}

fn field<T: DeserializeOwned>(value: &Value, what: &str) -> NotesResult<T> {
    T::deserialize(value)
        .map_err(|e| NotesError::MalformedImportDocument(format!("invalid {}: {}", what, e)))
}

/// Note ids must be unique within one video's collection
fn check_unique_ids(video_id: &str, notes: &[Note]) -> NotesResult<()> {
    let mut seen = BTreeSet::new();
    match notes.iter().find(|n| !seen.insert(n.id.as_str())) {
        Some(dup) => Err(NotesError::MalformedImportDocument(format!(
            "duplicate note id {} for video {}",
            dup.id.as_str(),
            video_id
        ))),
        None => Ok(()),
    }
}

impl ImportDocument {
    /// Detect the shape of `value` and validate it completely
    pub fn parse(value: &Value) -> NotesResult<Self> {
        let doc = value.as_object().ok_or_else(|| {
            NotesError::MalformedImportDocument("document is not a JSON object".to_string())
        })?;

        if let Some(all) = present(doc, "allTimestamps") {
            let raw: BTreeMap<String, Vec<Note>> = field(all, "allTimestamps")?;

            let mut collections = BTreeMap::new();
            for (key, notes) in raw {
                let video_id = keys::video_id_from_notes_key(&key).ok_or_else(|| {
                    NotesError::MalformedImportDocument(format!(
                        "unexpected key in allTimestamps: {}",
                        key
                    ))
                })?;
                check_unique_ids(video_id, &notes)?;
                collections.insert(video_id.to_string(), notes);
            }

            let videos: Vec<VideoRecord> = match present(doc, "videos") {
                Some(v) => field(v, "videos")?,
                None => Vec::new(),
            };
            let records = videos
                .into_iter()
                .filter(|r| collections.contains_key(&r.video_id))
                .collect();

            let version = match present(doc, "version") {
                Some(v) => field::<String>(v, "version")?,
                None => LEGACY_FORMAT_VERSION.to_string(),
            };

            return Ok(ImportDocument::Library {
                version,
                collections,
                records,
            });
        }

        if let Some(timestamps) = present(doc, "timestamps") {
            let notes: Vec<Note> = field(timestamps, "timestamps")?;
            let video: VideoRecord = match present(doc, "video") {
                Some(v) => field(v, "video")?,
                None => {
                    return Err(NotesError::MalformedImportDocument(
                        "single-video document has no video record".to_string(),
                    ))
                }
            };
            if video.video_id.is_empty() {
                return Err(NotesError::MalformedImportDocument(
                    "video record has an empty videoId".to_string(),
                ));
            }
            check_unique_ids(&video.video_id, &notes)?;

            return Ok(ImportDocument::Single { video, notes });
        }

        Err(NotesError::MalformedImportDocument(
            "document has neither allTimestamps nor timestamps".to_string(),
        ))
    }

    /// Write the document into `repo`.
    ///
    /// Note collections are replaced wholesale per video; videos the document
    /// does not mention are never touched. Cached note counts of the touched
    /// videos are repaired afterwards.
    pub async fn apply<R>(self, repo: &R) -> NotesResult<ImportSummary>
    where
        R: NoteRepository + ?Sized,
    {
        match self {
            ImportDocument::Single { video, notes } => {
                let video_id = video.video_id.clone();
                let count = notes.len();

                let _guard = repo.lock_video(&video_id).await;
                repo.put_notes(&video_id, &notes).await?;
                if count > 0 {
                    repo.put_metadata(&video_id, &video.to_metadata(count))
                        .await?;
                }

                info!(video_id = %video_id, notes = count, "Imported single video");
                Ok(ImportSummary {
                    shape: ImportShape::Single,
                    video_ids: vec![video_id],
                    notes: count,
                })
            }
            ImportDocument::Library {
                version,
                collections,
                records,
            } => {
                let records: BTreeMap<String, VideoRecord> = records
                    .into_iter()
                    .map(|r| (r.video_id.clone(), r))
                    .collect();

                let mut total = 0;
                let mut video_ids = Vec::with_capacity(collections.len());

                for (video_id, notes) in &collections {
                    let _guard = repo.lock_video(video_id).await;
                    repo.put_notes(video_id, notes).await?;

                    if !notes.is_empty() {
                        if let Some(record) = records.get(video_id) {
                            repo.put_metadata(video_id, &record.to_metadata(notes.len()))
                                .await?;
                        } else {
                            repair_metadata_locked(repo, video_id).await?;
                        }
                    }

                    debug!(video_id = %video_id, notes = notes.len(), "Imported collection");
                    total += notes.len();
                    video_ids.push(video_id.clone());
                }

                info!(videos = video_ids.len(), notes = total, %version, "Imported library");
                Ok(ImportSummary {
                    shape: ImportShape::Library { version },
                    video_ids,
                    notes: total,
                })
            }
        }
    }
}

/// Parse `value` and write it into `repo`
pub async fn import_document<R>(repo: &R, value: &Value) -> NotesResult<ImportSummary>
where
    R: NoteRepository + ?Sized,
{
    ImportDocument::parse(value)?.apply(repo).await
}

/// Bring one video's cached metadata counter back in line with its notes.
///
/// Metadata without notes is deleted. Returns whether anything was written.
pub async fn repair_metadata<R>(repo: &R, video_id: &str) -> NotesResult<bool>
where
    R: NoteRepository + ?Sized,
{
    let _guard = repo.lock_video(video_id).await;
    repair_metadata_locked(repo, video_id).await
}

async fn repair_metadata_locked<R>(repo: &R, video_id: &str) -> NotesResult<bool>
where
    R: NoteRepository + ?Sized,
{
    let notes = repo.get_notes(video_id).await?;
    let metadata = repo.get_metadata(video_id).await?;

    match metadata {
        Some(_) if notes.is_empty() => {
            repo.delete_video(video_id).await?;
            Ok(true)
        }
        Some(mut meta) if meta.note_count != notes.len() => {
            meta.note_count = notes.len();
            repo.put_metadata(video_id, &meta).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Repair every video that has notes or metadata; returns the repaired ids
pub async fn repair_all<R>(repo: &R) -> NotesResult<Vec<String>>
where
    R: NoteRepository + ?Sized,
{
    let snapshot = repo.snapshot().await?;
    let ids: BTreeSet<String> = snapshot
        .notes
        .keys()
        .chain(snapshot.metadata.keys())
        .cloned()
        .collect();

    let mut repaired = Vec::new();
    for id in ids {
        if repair_metadata(repo, &id).await? {
            repaired.push(id);
        }
    }
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note_json(id: &str, time: f64) -> Value {
        json!({
            "id": id,
            "videoId": "abc",
            "videoTitle": "Title",
            "videoUrl": "https://youtube.com/watch?v=abc",
            "time": time,
            "note": "text",
            "tags": [],
            "createdAt": "2024-05-01T12:00:00Z"
        })
    }

    #[test]
    fn test_detect_library_shape() {
        let doc = json!({
            "videos": [
                {"videoId": "abc", "title": "Title", "url": "", "tags": ["x"]},
                {"videoId": "gone", "title": "Other", "url": "", "tags": []}
            ],
            "allTimestamps": {"timestamps_abc": [note_json("1", 3.0)]},
            "exportedAt": "2024-05-02T00:00:00Z",
            "version": "2.0"
        });

        match ImportDocument::parse(&doc).unwrap() {
            ImportDocument::Library {
                version,
                collections,
                records,
            } => {
                assert_eq!(version, "2.0");
                assert_eq!(collections["abc"].len(), 1);
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].tags, vec!["x"]);
            }
            other => panic!("Expected library document, got {:?}", other),
        }
    }

    #[test]
    fn test_library_without_version_is_legacy() {
        let doc = json!({"allTimestamps": {}});
        match ImportDocument::parse(&doc).unwrap() {
            ImportDocument::Library { version, .. } => assert_eq!(version, "1.0"),
            other => panic!("Expected library document, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_single_shape() {
        let doc = json!({
            "video": {"videoId": "abc", "title": "Title", "url": "u", "tags": []},
            "timestamps": [note_json("1", 3.0), note_json("2", 1.0)],
            "exportedAt": "2024-05-02T00:00:00Z"
        });

        match ImportDocument::parse(&doc).unwrap() {
            ImportDocument::Single { video, notes } => {
                assert_eq!(video.video_id, "abc");
                assert_eq!(notes.len(), 2);
            }
            other => panic!("Expected single document, got {:?}", other),
        }
    }

    #[test]
    fn test_all_timestamps_takes_precedence() {
        let doc = json!({
            "allTimestamps": {"timestamps_abc": []},
            "timestamps": [note_json("1", 3.0)]
        });
        assert!(matches!(
            ImportDocument::parse(&doc).unwrap(),
            ImportDocument::Library { .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        for doc in [
            json!({"notes": []}),
            json!([1, 2]),
            json!({"allTimestamps": null, "timestamps": null}),
            json!({"allTimestamps": {"settings": []}}),
            json!({"allTimestamps": {"timestamps_abc": [{"id": "1"}]}}),
            json!({"timestamps": [note_json("1", 1.0)]}),
            json!({"video": {"videoId": ""}, "timestamps": []}),
            json!({"allTimestamps": {"timestamps_v": [note_json("1", 1.0), note_json("1", 2.0)]}}),
            json!({
                "video": {"videoId": "v", "title": "", "url": "", "tags": []},
                "timestamps": [note_json("7", 1.0), note_json("8", 2.0), note_json("7", 3.0)]
            }),
        ] {
            assert!(
                matches!(
                    ImportDocument::parse(&doc),
                    Err(NotesError::MalformedImportDocument(_))
                ),
                "document should be rejected: {}",
                doc
            );
        }
    }

    #[test]
    fn test_export_file_names() {
        let record = VideoRecord {
            video_id: "abc".to_string(),
            title: String::new(),
            url: String::new(),
            tags: Vec::new(),
            note_count: None,
            updated_at: None,
        };
        let export = VideoExport {
            video: record,
            timestamps: Vec::new(),
            exported_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        };
        assert_eq!(export.file_name(), "video-notes-abc-1700000000123.json");

        let value = serde_json::to_value(&export).unwrap();
        assert!(value.get("version").is_none());
        assert!(value["video"].get("noteCount").is_none());
        assert!(value.get("exportedAt").is_some());
    }
}
