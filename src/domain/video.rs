//! Video-level records: identity, persisted metadata, and the derived
//! entity shown in the library view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::note::Note;

/// Title used when neither notes nor metadata carry one
pub const UNKNOWN_TITLE: &str = "Unknown Video";

/// Identity of a video as reported by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoIdentity {
    pub video_id: String,
    pub title: String,
    pub url: String,
}

impl VideoIdentity {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Persisted per-video record, stored separately from the notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default)]
    pub video_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub url: String,

    /// Video-level tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Cached note count. Aggregation never reads it; it is kept equal to the
    /// live count for older readers of the store.
    #[serde(default)]
    pub note_count: usize,

    /// Refreshed on every change to this video's notes or tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl VideoMetadata {
    /// Fresh metadata for a video that has none yet
    pub fn new(video: &VideoIdentity) -> Self {
        Self {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            url: video.url.clone(),
            tags: Vec::new(),
            note_count: 0,
            updated_at: None,
        }
    }

    /// Record a change to this video's notes or tags
    pub fn touch(&mut self, note_count: usize) {
        self.note_count = note_count;
        self.updated_at = Some(Utc::now());
    }
}

/// Join of a video's notes and metadata, computed on demand and never stored
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntity {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub timestamps: Vec<Note>,
    pub note_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl VideoEntity {
    /// Build the entity for `video_id`.
    ///
    /// Returns `None` when there are no notes: metadata alone never surfaces.
    pub fn from_parts(
        video_id: &str,
        notes: Vec<Note>,
        metadata: Option<&VideoMetadata>,
    ) -> Option<Self> {
        let first = notes.first()?;
        let last = notes.last()?;

        let title = non_empty(&first.video_title)
            .or_else(|| metadata.and_then(|m| non_empty(&m.title)))
            .unwrap_or(UNKNOWN_TITLE)
            .to_string();

        let url = non_empty(&first.video_url)
            .or_else(|| metadata.and_then(|m| non_empty(&m.url)))
            .unwrap_or_default()
            .to_string();

        let updated_at = metadata
            .and_then(|m| m.updated_at)
            .unwrap_or(last.created_at);

        Some(Self {
            video_id: video_id.to_string(),
            title,
            url,
            tags: metadata.map(|m| m.tags.clone()).unwrap_or_default(),
            note_count: notes.len(),
            timestamps: notes,
            updated_at,
        })
    }

    /// The identity fields of this entity
    pub fn identity(&self) -> VideoIdentity {
        VideoIdentity::new(&self.video_id, &self.title, &self.url)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note_at(video: &VideoIdentity, time: f64, day: u32) -> Note {
        let no_tags: [&str; 0] = [];
        Note::new(video, time, "note", no_tags)
            .unwrap()
            .with_created_at(Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_entity_requires_notes() {
        let video = VideoIdentity::new("v1", "Title", "https://example.com/v1");
        let meta = VideoMetadata::new(&video);
        assert!(VideoEntity::from_parts("v1", Vec::new(), Some(&meta)).is_none());
    }

    #[test]
    fn test_title_precedence() {
        let video = VideoIdentity::new("v1", "", "");
        let mut meta = VideoMetadata::new(&video);
        meta.title = "From Metadata".to_string();
        meta.url = "https://example.com/meta".to_string();

        let entity =
            VideoEntity::from_parts("v1", vec![note_at(&video, 1.0, 1)], Some(&meta)).unwrap();
        assert_eq!(entity.title, "From Metadata");
        assert_eq!(entity.url, "https://example.com/meta");

        let entity = VideoEntity::from_parts("v1", vec![note_at(&video, 1.0, 1)], None).unwrap();
        assert_eq!(entity.title, UNKNOWN_TITLE);
        assert_eq!(entity.url, "");

        let titled = VideoIdentity::new("v1", "From Note", "https://example.com/note");
        let entity =
            VideoEntity::from_parts("v1", vec![note_at(&titled, 1.0, 1)], Some(&meta)).unwrap();
        assert_eq!(entity.title, "From Note");
        assert_eq!(entity.url, "https://example.com/note");
    }

    #[test]
    fn test_updated_at_falls_back_to_last_note() {
        let video = VideoIdentity::new("v1", "Title", "");
        let notes = vec![note_at(&video, 50.0, 3), note_at(&video, 10.0, 7)];

        let entity = VideoEntity::from_parts("v1", notes.clone(), None).unwrap();
        assert_eq!(
            entity.updated_at,
            Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap()
        );

        let mut meta = VideoMetadata::new(&video);
        meta.updated_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        let entity = VideoEntity::from_parts("v1", notes, Some(&meta)).unwrap();
        assert_eq!(entity.updated_at, meta.updated_at.unwrap());
    }

    #[test]
    fn test_note_count_ignores_cached_counter() {
        let video = VideoIdentity::new("v1", "Title", "");
        let mut meta = VideoMetadata::new(&video);
        meta.note_count = 99;

        let entity = VideoEntity::from_parts(
            "v1",
            vec![note_at(&video, 1.0, 1), note_at(&video, 2.0, 2)],
            Some(&meta),
        )
        .unwrap();
        assert_eq!(entity.note_count, 2);
    }

    #[test]
    fn test_metadata_defaults_when_fields_missing() {
        let meta: VideoMetadata = serde_json::from_str(r#"{"tags": ["a"]}"#).unwrap();
        assert_eq!(meta.note_count, 0);
        assert!(meta.updated_at.is_none());
        assert_eq!(meta.tags, vec!["a"]);
    }
}
