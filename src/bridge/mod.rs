//! Interface to the page that plays the video.
//!
//! A bridge reports the playback position and identity of the current video,
//! seeks, and captures the displayed frame. Frame capture is allowed to
//! fail (cross-origin canvases, missing video element); callers fall back to
//! a remote thumbnail URL keyed by video id.

pub mod manual;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::VideoIdentity;
use crate::error::NotesResult;

pub use manual::ManualBridge;

/// Default thumbnail used when a frame cannot be captured
pub const DEFAULT_THUMBNAIL_URL: &str = "https://i.ytimg.com/vi/{video_id}/hqdefault.jpg";

/// Snapshot of the page's video state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// A video element was found on the page
    pub is_video_page: bool,

    /// Playback position in seconds
    pub current_time: f64,

    /// Duration in seconds
    pub duration: f64,

    pub title: String,

    pub video_id: Option<String>,

    pub url: String,
}

impl VideoInfo {
    /// Info reported when the page has no video element
    pub fn no_video(url: impl Into<String>) -> Self {
        Self {
            is_video_page: false,
            current_time: 0.0,
            duration: 0.0,
            title: "No video detected".to_string(),
            video_id: None,
            url: url.into(),
        }
    }

    /// Identity of the playing video, when there is one
    pub fn identity(&self) -> Option<VideoIdentity> {
        match (&self.video_id, self.is_video_page) {
            (Some(id), true) if !id.is_empty() => {
                Some(VideoIdentity::new(id, &self.title, &self.url))
            }
            _ => None,
        }
    }
}

/// Result of a frame capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FrameCapture {
    /// Frame encoded as an image data URI
    Captured { image: String },

    /// Capture was not possible
    Failed { reason: String },
}

/// Trait for video page bridges
#[async_trait]
pub trait VideoBridge: Send + Sync {
    /// Human-readable bridge name
    fn name(&self) -> &str;

    /// Current playback state and identity
    async fn current_info(&self) -> NotesResult<VideoInfo>;

    /// Move playback to `time` seconds and resume it if paused
    async fn seek(&self, time: f64) -> NotesResult<()>;

    /// Capture the frame currently displayed
    async fn capture_frame(&self) -> NotesResult<FrameCapture>;
}

/// Remote thumbnail for `video_id`, from a template containing `{video_id}`
pub fn thumbnail_fallback(template: &str, video_id: &str) -> String {
    template.replace("{video_id}", video_id)
}

/// Whether `url` belongs to one of the supported video hosts
pub fn is_supported_url(url: &str, hosts: &[String]) -> bool {
    let url = url.to_lowercase();
    hosts.iter().any(|h| url.contains(&h.to_lowercase()))
}
