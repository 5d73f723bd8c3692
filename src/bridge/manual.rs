//! Bridge fed from explicit values instead of a live page.
//!
//! Used by the command line, where the video identity and position come from
//! flags and a captured frame is an image file on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;

use super::{FrameCapture, VideoBridge, VideoInfo};
use crate::domain::VideoIdentity;
use crate::error::NotesResult;

/// Bridge over a fixed video identity and a movable playback position
#[derive(Debug)]
pub struct ManualBridge {
    video: Option<VideoIdentity>,
    duration: f64,
    position: Mutex<f64>,
    playing: AtomicBool,
    frame_path: Option<PathBuf>,
    page_url: String,
}

impl ManualBridge {
    /// Bridge for a page showing `video`, positioned at `time`
    pub fn new(video: VideoIdentity, time: f64) -> Self {
        Self {
            page_url: video.url.clone(),
            video: Some(video),
            duration: 0.0,
            position: Mutex::new(time),
            playing: AtomicBool::new(false),
            frame_path: None,
        }
    }

    /// Bridge for a page without a video element
    pub fn without_video(page_url: impl Into<String>) -> Self {
        Self {
            video: None,
            duration: 0.0,
            position: Mutex::new(0.0),
            playing: AtomicBool::new(false),
            frame_path: None,
            page_url: page_url.into(),
        }
    }

    /// Image file returned as the captured frame
    pub fn with_frame(mut self, path: impl Into<PathBuf>) -> Self {
        self.frame_path = Some(path.into());
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Current playback position
    pub fn position(&self) -> f64 {
        *self
            .position
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether playback is running; a new bridge starts paused
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

#[async_trait]
impl VideoBridge for ManualBridge {
    fn name(&self) -> &str {
        "manual"
    }

    async fn current_info(&self) -> NotesResult<VideoInfo> {
        let Some(video) = &self.video else {
            return Ok(VideoInfo::no_video(&self.page_url));
        };

        Ok(VideoInfo {
            is_video_page: true,
            current_time: self.position(),
            duration: self.duration,
            title: video.title.clone(),
            video_id: Some(video.video_id.clone()),
            url: video.url.clone(),
        })
    }

    async fn seek(&self, time: f64) -> NotesResult<()> {
        if self.video.is_some() {
            *self
                .position
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = time;
            self.playing.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn capture_frame(&self) -> NotesResult<FrameCapture> {
        let Some(path) = &self.frame_path else {
            return Ok(FrameCapture::Failed {
                reason: "no frame source available".to_string(),
            });
        };

        match fs::read(path).await {
            Ok(bytes) => Ok(FrameCapture::Captured {
                image: format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)),
            }),
            Err(e) => Ok(FrameCapture::Failed {
                reason: format!("cannot read {}: {}", path.display(), e),
            }),
        }
    }
}
