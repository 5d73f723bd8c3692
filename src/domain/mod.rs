//! Domain types for the notes library.
//!
//! This module contains the core data structures:
//! - Note: an immutable timestamped annotation
//! - VideoMetadata: the persisted per-video record
//! - VideoEntity: the derived join of the two, built by aggregation

pub mod note;
pub mod time;
pub mod video;

// Re-export commonly used types
pub use note::{filter_notes, parse_tags, sort_by_time, Note, NoteId};
pub use time::{format_time, parse_time, timestamp_url};
pub use video::{VideoEntity, VideoIdentity, VideoMetadata, UNKNOWN_TITLE};
