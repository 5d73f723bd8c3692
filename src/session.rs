//! Per-session UI state passed through every controller handler.
//!
//! Handlers never mutate a session in place; they return the next state.

use serde::Serialize;

use crate::domain::VideoIdentity;
use crate::error::{NotesError, NotesResult};

/// The video currently open, with its video-level tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedVideo {
    pub identity: VideoIdentity,
    pub tags: Vec<String>,
}

/// A captured playback position waiting for its note text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capture {
    /// Seconds into the video
    pub time: f64,

    /// Captured frame or fallback thumbnail
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub video: Option<LoadedVideo>,
    pub capture: Option<Capture>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with `video` loaded. A pending capture survives only when the
    /// same video is reloaded.
    pub fn with_video(&self, video: LoadedVideo) -> Self {
        let same_video = self.video_id() == Some(video.identity.video_id.as_str());
        Self {
            capture: if same_video { self.capture.clone() } else { None },
            video: Some(video),
        }
    }

    pub fn with_capture(&self, capture: Capture) -> Self {
        Self {
            video: self.video.clone(),
            capture: Some(capture),
        }
    }

    /// State after the pending capture was consumed
    pub fn without_capture(&self) -> Self {
        Self {
            video: self.video.clone(),
            capture: None,
        }
    }

    /// State with the loaded video's tags replaced
    pub fn with_tags(&self, tags: Vec<String>) -> Self {
        Self {
            video: self.video.clone().map(|v| LoadedVideo { tags, ..v }),
            capture: self.capture.clone(),
        }
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video.as_ref().map(|v| v.identity.video_id.as_str())
    }

    /// The loaded video, or `NoActiveVideo`
    pub fn require_video(&self) -> NotesResult<&LoadedVideo> {
        self.video.as_ref().ok_or(NotesError::NoActiveVideo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(id: &str) -> LoadedVideo {
        LoadedVideo {
            identity: VideoIdentity::new(id, "Title", ""),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_capture_survives_same_video_reload() {
        let state = SessionState::new().with_video(loaded("a")).with_capture(Capture {
            time: 5.0,
            thumbnail: None,
        });

        assert!(state.with_video(loaded("a")).capture.is_some());
        assert!(state.with_video(loaded("b")).capture.is_none());
    }

    #[test]
    fn test_updates_leave_original_untouched() {
        let state = SessionState::new().with_video(loaded("a"));
        let tagged = state.with_tags(vec!["rust".to_string()]);

        assert!(state.video.as_ref().unwrap().tags.is_empty());
        assert_eq!(tagged.video.unwrap().tags, vec!["rust"]);
    }

    #[test]
    fn test_require_video() {
        assert!(matches!(
            SessionState::new().require_video(),
            Err(NotesError::NoActiveVideo)
        ));
        assert_eq!(
            SessionState::new().with_video(loaded("a")).video_id(),
            Some("a")
        );
    }
}
