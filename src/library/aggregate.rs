//! Aggregation of stored notes and metadata into video entities.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::{Note, VideoEntity, VideoMetadata};

/// Build one entity per video that has at least one note.
///
/// Videos known only through metadata, or with an empty note collection,
/// are dropped. Output order is unspecified; callers sort.
pub fn aggregate(
    notes: BTreeMap<String, Vec<Note>>,
    metadata: &BTreeMap<String, VideoMetadata>,
) -> Vec<VideoEntity> {
    notes
        .into_iter()
        .filter_map(|(video_id, notes)| {
            VideoEntity::from_parts(&video_id, notes, metadata.get(&video_id))
        })
        .collect()
}

/// Library-wide counters shown above the video list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub videos: usize,
    pub notes: usize,
    /// Distinct tags across video-level and note-level tags
    pub tags: usize,
}

impl LibraryStats {
    pub fn compute(entities: &[VideoEntity]) -> Self {
        let mut tags: BTreeSet<&str> = BTreeSet::new();
        for entity in entities {
            tags.extend(entity.tags.iter().map(String::as_str));
            for note in &entity.timestamps {
                tags.extend(note.tags.iter().map(String::as_str));
            }
        }

        Self {
            videos: entities.len(),
            notes: entities.iter().map(|e| e.note_count).sum(),
            tags: tags.len(),
        }
    }
}

impl std::fmt::Display for LibraryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            plural(self.videos, "video"),
            plural(self.notes, "note"),
            plural(self.tags, "tag")
        )
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
