//! Key naming for the flat key-value layout.
//!
//! ```text
//! timestamps_<videoId>   -> [Note, ...]      (append order)
//! video_meta_<videoId>   -> VideoMetadata
//! ```

/// Prefix of note collection keys
pub const NOTES_PREFIX: &str = "timestamps_";

/// Prefix of video metadata keys
pub const META_PREFIX: &str = "video_meta_";

/// Key holding the notes of `video_id`
pub fn notes_key(video_id: &str) -> String {
    format!("{}{}", NOTES_PREFIX, video_id)
}

/// Key holding the metadata of `video_id`
pub fn meta_key(video_id: &str) -> String {
    format!("{}{}", META_PREFIX, video_id)
}

/// Video id of a note collection key, if it is one
pub fn video_id_from_notes_key(key: &str) -> Option<&str> {
    key.strip_prefix(NOTES_PREFIX).filter(|id| !id.is_empty())
}

/// Video id of a metadata key, if it is one
pub fn video_id_from_meta_key(key: &str) -> Option<&str> {
    key.strip_prefix(META_PREFIX).filter(|id| !id.is_empty())
}
