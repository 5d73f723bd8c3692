//! Search, tag filtering and ordering of the library view.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{sort_by_time, VideoEntity};

/// Ordering of the library view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Most recently updated first
    #[default]
    Recent,

    /// Least recently updated first
    Oldest,

    /// By title
    Title,

    /// Most notes first
    Notes,

    /// Keep aggregation order
    #[serde(other)]
    Unsorted,
}

impl SortKey {
    /// Parse a sort key; unrecognized keys keep the input order
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "recent" => SortKey::Recent,
            "oldest" => SortKey::Oldest,
            "title" => SortKey::Title,
            "notes" => SortKey::Notes,
            _ => SortKey::Unsorted,
        }
    }

    fn compare(&self, a: &VideoEntity, b: &VideoEntity) -> Ordering {
        match self {
            SortKey::Recent => b.updated_at.cmp(&a.updated_at),
            SortKey::Oldest => a.updated_at.cmp(&b.updated_at),
            SortKey::Title => compare_titles(&a.title, &b.title),
            SortKey::Notes => b.note_count.cmp(&a.note_count),
            SortKey::Unsorted => Ordering::Equal,
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Recent => write!(f, "recent"),
            SortKey::Oldest => write!(f, "oldest"),
            SortKey::Title => write!(f, "title"),
            SortKey::Notes => write!(f, "notes"),
            SortKey::Unsorted => write!(f, "unsorted"),
        }
    }
}

/// Base letters only: decomposed, combining marks stripped, case-folded
fn collation_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare base letters first, then accents and case, then raw text
fn compare_titles(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Search text, tag text and ordering applied to the library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryQuery {
    #[serde(default)]
    pub search_text: String,

    #[serde(default)]
    pub tag_text: String,

    #[serde(default)]
    pub sort_key: SortKey,
}

impl LibraryQuery {
    pub fn new(search_text: impl Into<String>, tag_text: impl Into<String>, sort_key: SortKey) -> Self {
        Self {
            search_text: search_text.into(),
            tag_text: tag_text.into(),
            sort_key,
        }
    }

    /// Title or any note text contains the search text
    pub fn matches_search(&self, entity: &VideoEntity) -> bool {
        let needle = self.search_text.to_lowercase();
        if needle.is_empty() {
            return true;
        }

        entity.title.to_lowercase().contains(&needle)
            || entity
                .timestamps
                .iter()
                .any(|n| n.note.to_lowercase().contains(&needle))
    }

    /// Any video-level or note-level tag contains the tag text
    pub fn matches_tag(&self, entity: &VideoEntity) -> bool {
        let needle = self.tag_text.to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let tag_matches = |tag: &String| tag.to_lowercase().contains(&needle);
        entity.tags.iter().any(tag_matches)
            || entity
                .timestamps
                .iter()
                .any(|n| n.tags.iter().any(tag_matches))
    }

    pub fn matches(&self, entity: &VideoEntity) -> bool {
        self.matches_search(entity) && self.matches_tag(entity)
    }
}

/// Filter and order `entities` for display.
///
/// The input is left untouched. Ordering is stable, so ties keep their
/// relative input order. Each returned entity has its notes sorted by time.
pub fn filter_and_sort(entities: &[VideoEntity], query: &LibraryQuery) -> Vec<VideoEntity> {
    let mut filtered: Vec<VideoEntity> = entities
        .iter()
        .filter(|e| query.matches(e))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| query.sort_key.compare(a, b));

    for entity in &mut filtered {
        sort_by_time(&mut entity.timestamps);
    }

    filtered
}
