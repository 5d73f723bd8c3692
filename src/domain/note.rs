//! Timestamped notes attached to a video.
//!
//! Notes are immutable once saved. They carry denormalized copies of the
//! owning video's identity so a video can still be titled when its metadata
//! record is missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::video::VideoIdentity;
use crate::error::{NotesError, NotesResult};

/// Note identifier, unique within one video's note collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single timestamped annotation on a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique within the owning video's collection
    pub id: NoteId,

    /// Owning video id at creation time
    #[serde(default)]
    pub video_id: String,

    /// Video title at creation time
    #[serde(default)]
    pub video_title: String,

    /// Video URL at creation time
    #[serde(default)]
    pub video_url: String,

    /// Offset into the video in seconds
    pub time: f64,

    /// Display text
    pub note: String,

    /// Note-level tags, in entry order
    #[serde(default)]
    pub tags: Vec<String>,

    /// Captured frame as a data URI, or a remote thumbnail URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Set once when the note is saved
    pub created_at: DateTime<Utc>,

    /// Fields written by other versions of the format, carried through untouched
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Note {
    /// Create a note for `video` at `time` seconds.
    ///
    /// Rejects negative or non-finite times and blank text. Tags are trimmed
    /// and empty tags dropped.
    pub fn new(
        video: &VideoIdentity,
        time: f64,
        text: &str,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> NotesResult<Self> {
        if !time.is_finite() || time < 0.0 {
            return Err(NotesError::EmptyNoteRejected(format!(
                "Invalid timestamp: {}",
                time
            )));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(NotesError::EmptyNoteRejected(
                "Please add a note!".to_string(),
            ));
        }

        let tags = tags
            .into_iter()
            .map(|t| {
                let t: String = t.into();
                t.trim().to_string()
            })
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Self {
            id: NoteId::generate(),
            video_id: video.video_id.clone(),
            video_title: video.title.clone(),
            video_url: video.url.clone(),
            time,
            note: text.to_string(),
            tags,
            thumbnail: None,
            created_at: Utc::now(),
            extra: serde_json::Map::new(),
        })
    }

    /// Attach a thumbnail (data URI or remote URL)
    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// Override the generated id
    pub fn with_id(mut self, id: impl Into<NoteId>) -> Self {
        self.id = id.into();
        self
    }

    /// Override the creation time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Case-insensitive match against the note text or its joined tags.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.note.to_lowercase().contains(needle)
            || self.tags.join(",").to_lowercase().contains(needle)
    }
}

/// Split comma-separated tag input into trimmed, non-empty tags
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Sort notes ascending by time; equal times keep their stored order
pub fn sort_by_time(notes: &mut [Note]) {
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Notes whose text or tags contain `query` (case-insensitive).
///
/// A blank query keeps every note.
pub fn filter_notes<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return notes.iter().collect();
    }
    notes.iter().filter(|n| n.matches(&needle)).collect()
}
