//! Command handlers behind every user action.
//!
//! The controller owns no UI state: each handler receives the current
//! [`SessionState`] (where relevant), talks to the repository and the video
//! bridge, and returns plain data plus the next session state. Handlers that
//! read, modify and write a video's notes hold that video's lock throughout.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::bridge::{
    is_supported_url, thumbnail_fallback, FrameCapture, VideoBridge, DEFAULT_THUMBNAIL_URL,
};
use crate::domain::{filter_notes, parse_tags, sort_by_time, Note, VideoEntity, VideoMetadata};
use crate::error::{NotesError, NotesResult};
use crate::library::{
    self, aggregate, filter_and_sort, ImportSummary, LibraryExport, LibraryQuery, LibraryStats,
    VideoExport,
};
use crate::repository::NoteRepository;
use crate::session::{Capture, LoadedVideo, SessionState};

/// Asks the user to confirm a destructive action
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Host and thumbnail settings used by the capture handlers
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// URL fragments identifying supported video pages
    pub hosts: Vec<String>,

    /// Fallback thumbnail template containing `{video_id}`
    pub thumbnail_url: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            hosts: vec!["youtube.com".to_string(), "youtu.be".to_string()],
            thumbnail_url: DEFAULT_THUMBNAIL_URL.to_string(),
        }
    }
}

/// Everything the library screen renders
#[derive(Debug, Clone, Serialize)]
pub struct LibraryView {
    /// Filtered and sorted entities, notes ordered by time
    pub entities: Vec<VideoEntity>,

    /// Counters over the whole library, not just the filtered subset
    pub stats: LibraryStats,

    /// Videos before filtering
    pub total_videos: usize,
}

pub struct Controller<R, B> {
    repo: R,
    bridge: B,
    settings: ControllerSettings,
}

impl<R, B> Controller<R, B>
where
    R: NoteRepository,
    B: VideoBridge,
{
    pub fn new(repo: R, bridge: B) -> Self {
        Self::with_settings(repo, bridge, ControllerSettings::default())
    }

    pub fn with_settings(repo: R, bridge: B, settings: ControllerSettings) -> Self {
        Self {
            repo,
            bridge,
            settings,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    // ========================================================================
    // Current video
    // ========================================================================

    /// Load the video shown by the bridge, with its stored video-level tags
    #[instrument(skip(self, state), fields(bridge = %self.bridge.name()))]
    pub async fn load_video(&self, state: &SessionState) -> NotesResult<SessionState> {
        let info = self.bridge.current_info().await?;

        if !is_supported_url(&info.url, &self.settings.hosts) {
            return Err(NotesError::NotVideoPlatform { url: info.url });
        }
        let identity = info.identity().ok_or(NotesError::NoActiveVideo)?;

        let tags = self
            .repo
            .get_metadata(&identity.video_id)
            .await?
            .map(|m| m.tags)
            .unwrap_or_default();

        debug!(video_id = %identity.video_id, "Video loaded");
        Ok(state.with_video(LoadedVideo { identity, tags }))
    }

    /// Record the current playback position and frame.
    ///
    /// A failed frame capture is not an error: the note gets the remote
    /// thumbnail of the video instead.
    #[instrument(skip(self, state))]
    pub async fn capture(&self, state: &SessionState) -> NotesResult<SessionState> {
        let video = state.require_video()?;
        let info = self.bridge.current_info().await?;
        if info.identity().is_none() {
            return Err(NotesError::NoActiveVideo);
        }

        let thumbnail = match self.bridge.capture_frame().await? {
            FrameCapture::Captured { image } => image,
            FrameCapture::Failed { reason } => {
                let err = NotesError::FrameCaptureFailed(reason);
                warn!(error = %err, "Falling back to remote thumbnail");
                thumbnail_fallback(&self.settings.thumbnail_url, &video.identity.video_id)
            }
        };

        debug!(time = info.current_time, "Position captured");
        Ok(state.with_capture(Capture {
            time: info.current_time,
            thumbnail: Some(thumbnail),
        }))
    }

    /// Save a note at the captured position.
    ///
    /// Metadata is created on the first save and its count kept equal to the
    /// number of stored notes. The capture is consumed on success.
    #[instrument(skip(self, state, text, tags_text))]
    pub async fn save_note(
        &self,
        state: &SessionState,
        text: &str,
        tags_text: &str,
    ) -> NotesResult<(SessionState, Note)> {
        let video = state.require_video()?;
        let capture = state.capture.as_ref().ok_or_else(|| {
            NotesError::EmptyNoteRejected("Please capture a timestamp first!".to_string())
        })?;

        let note = Note::new(&video.identity, capture.time, text, parse_tags(tags_text))?
            .with_thumbnail(capture.thumbnail.clone());
        let video_id = &video.identity.video_id;

        let _guard = self.repo.lock_video(video_id).await;
        let mut notes = self.repo.get_notes(video_id).await?;
        notes.push(note.clone());
        self.repo.put_notes(video_id, &notes).await?;

        let mut meta = match self.repo.get_metadata(video_id).await? {
            Some(meta) => meta,
            None => {
                let mut meta = VideoMetadata::new(&video.identity);
                meta.tags = video.tags.clone();
                meta
            }
        };
        meta.touch(notes.len());
        self.repo.put_metadata(video_id, &meta).await?;

        info!(video_id = %video_id, note_id = %note.id, notes = notes.len(), "Note saved");
        Ok((state.without_capture(), note))
    }

    /// Notes of the loaded video sorted by time, filtered by note text or tags
    pub async fn current_notes(&self, state: &SessionState, filter: &str) -> NotesResult<Vec<Note>> {
        let video = state.require_video()?;
        let mut notes = self.repo.get_notes(&video.identity.video_id).await?;
        sort_by_time(&mut notes);

        Ok(filter_notes(&notes, filter).into_iter().cloned().collect())
    }

    /// Seek the page to `time`. Without a video on the page this does nothing
    /// and returns `false`.
    pub async fn seek(&self, time: f64) -> NotesResult<bool> {
        let info = self.bridge.current_info().await?;
        if info.identity().is_none() {
            debug!("No active video, seek ignored");
            return Ok(false);
        }

        self.bridge.seek(time).await?;
        Ok(true)
    }

    /// Replace the loaded video's tags, creating metadata if needed
    #[instrument(skip(self, state, tags_text))]
    pub async fn save_video_tags(
        &self,
        state: &SessionState,
        tags_text: &str,
    ) -> NotesResult<SessionState> {
        let video = state.require_video()?;
        let video_id = &video.identity.video_id;
        let tags = parse_tags(tags_text);

        let _guard = self.repo.lock_video(video_id).await;
        let note_count = self.repo.get_notes(video_id).await?.len();
        let mut meta = self
            .repo
            .get_metadata(video_id)
            .await?
            .unwrap_or_else(|| VideoMetadata::new(&video.identity));
        meta.tags = tags.clone();
        meta.touch(note_count);
        self.repo.put_metadata(video_id, &meta).await?;

        info!(video_id = %video_id, tags = tags.len(), "Video tags saved");
        Ok(state.with_tags(tags))
    }

    // ========================================================================
    // Destructive actions
    // ========================================================================

    /// Delete one note of the loaded video. Deleting the last note removes
    /// the video's metadata too.
    #[instrument(skip(self, state, confirm))]
    pub async fn delete_note(
        &self,
        state: &SessionState,
        note_id: &str,
        confirm: &dyn Confirm,
    ) -> NotesResult<bool> {
        let video = state.require_video()?;
        if !confirm.confirm("Delete this note?") {
            return Ok(false);
        }
        let video_id = &video.identity.video_id;

        let _guard = self.repo.lock_video(video_id).await;
        let mut notes = self.repo.get_notes(video_id).await?;
        let before = notes.len();
        notes.retain(|n| n.id.as_str() != note_id);
        if notes.len() == before {
            return Err(NotesError::NoteNotFound {
                video_id: video_id.clone(),
                note_id: note_id.to_string(),
            });
        }

        self.repo.put_notes(video_id, &notes).await?;
        if !notes.is_empty() {
            let mut meta = self
                .repo
                .get_metadata(video_id)
                .await?
                .unwrap_or_else(|| VideoMetadata::new(&video.identity));
            meta.touch(notes.len());
            self.repo.put_metadata(video_id, &meta).await?;
        }

        info!(video_id = %video_id, note_id, remaining = notes.len(), "Note deleted");
        Ok(true)
    }

    /// Delete every note of the loaded video, along with its metadata
    #[instrument(skip(self, state, confirm))]
    pub async fn clear_notes(&self, state: &SessionState, confirm: &dyn Confirm) -> NotesResult<bool> {
        let video = state.require_video()?;
        if !confirm.confirm("Delete all notes for this video?") {
            return Ok(false);
        }
        let video_id = &video.identity.video_id;

        let _guard = self.repo.lock_video(video_id).await;
        self.repo.delete_video(video_id).await?;

        info!(video_id = %video_id, "Notes cleared");
        Ok(true)
    }

    /// Delete a video from the library
    #[instrument(skip(self, confirm))]
    pub async fn delete_video(&self, video_id: &str, confirm: &dyn Confirm) -> NotesResult<bool> {
        if !confirm.confirm("Delete this video and all its notes?") {
            return Ok(false);
        }

        let _guard = self.repo.lock_video(video_id).await;
        let has_notes = !self.repo.get_notes(video_id).await?.is_empty();
        let has_meta = self.repo.get_metadata(video_id).await?.is_some();
        if !has_notes && !has_meta {
            return Err(NotesError::VideoNotFound(video_id.to_string()));
        }

        self.repo.delete_video(video_id).await?;
        info!(video_id, "Video deleted");
        Ok(true)
    }

    // ========================================================================
    // Library
    // ========================================================================

    /// Re-read the store and build the filtered library view
    pub async fn library_view(&self, query: &LibraryQuery) -> NotesResult<LibraryView> {
        let snapshot = self.repo.snapshot().await?;
        let entities = aggregate(snapshot.notes, &snapshot.metadata);
        let stats = LibraryStats::compute(&entities);

        Ok(LibraryView {
            total_videos: entities.len(),
            entities: filter_and_sort(&entities, query),
            stats,
        })
    }

    /// Export one video with its notes
    pub async fn export_video(&self, video_id: &str) -> NotesResult<VideoExport> {
        let notes = self.repo.get_notes(video_id).await?;
        let meta = self.repo.get_metadata(video_id).await?;
        let entity = VideoEntity::from_parts(video_id, notes, meta.as_ref())
            .ok_or_else(|| NotesError::VideoNotFound(video_id.to_string()))?;

        Ok(VideoExport::new(&entity, meta.as_ref()))
    }

    /// Export the loaded video
    pub async fn export_current(&self, state: &SessionState) -> NotesResult<VideoExport> {
        let video = state.require_video()?;
        self.export_video(&video.identity.video_id).await
    }

    /// Export every video that has notes
    pub async fn export_library(&self) -> NotesResult<LibraryExport> {
        let snapshot = self.repo.snapshot().await?;
        let entities = aggregate(snapshot.notes, &snapshot.metadata);

        info!(videos = entities.len(), "Library exported");
        Ok(LibraryExport::new(&entities, &snapshot.metadata))
    }

    /// Import a parsed export document of either shape
    #[instrument(skip(self, document))]
    pub async fn import_document(&self, document: &Value) -> NotesResult<ImportSummary> {
        library::import_document(&self.repo, document).await
    }

    /// Align every cached note count with the stored notes; returns the
    /// repaired video ids
    pub async fn repair_metadata(&self) -> NotesResult<Vec<String>> {
        let repaired = library::repair_all(&self.repo).await?;
        info!(repaired = repaired.len(), "Metadata repaired");
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bridge::ManualBridge;
    use crate::domain::VideoIdentity;
    use crate::repository::KvNoteRepository;
    use crate::store::MemoryStore;

    fn video() -> VideoIdentity {
        VideoIdentity::new("abc", "Talk", "https://www.youtube.com/watch?v=abc")
    }

    fn controller(bridge: ManualBridge) -> Controller<KvNoteRepository, ManualBridge> {
        Controller::new(KvNoteRepository::new(Arc::new(MemoryStore::new())), bridge)
    }

    async fn loaded(ctl: &Controller<KvNoteRepository, ManualBridge>) -> SessionState {
        ctl.load_video(&SessionState::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_load_rejects_unsupported_host() {
        let ctl = controller(ManualBridge::new(
            VideoIdentity::new("1", "Clip", "https://vimeo.com/1"),
            0.0,
        ));
        let err = ctl.load_video(&SessionState::new()).await.unwrap_err();
        assert!(matches!(err, NotesError::NotVideoPlatform { .. }));
    }

    #[tokio::test]
    async fn test_load_without_video_element() {
        let ctl = controller(ManualBridge::without_video("https://www.youtube.com/"));
        let err = ctl.load_video(&SessionState::new()).await.unwrap_err();
        assert!(matches!(err, NotesError::NoActiveVideo));
    }

    #[tokio::test]
    async fn test_capture_falls_back_to_thumbnail() {
        let ctl = controller(ManualBridge::new(video(), 65.0));
        let state = ctl.capture(&loaded(&ctl).await).await.unwrap();

        let capture = state.capture.unwrap();
        assert_eq!(capture.time, 65.0);
        assert_eq!(
            capture.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/abc/hqdefault.jpg")
        );
    }

    #[tokio::test]
    async fn test_save_without_capture_is_rejected() {
        let ctl = controller(ManualBridge::new(video(), 10.0));
        let state = loaded(&ctl).await;

        let err = ctl.save_note(&state, "hello", "").await.unwrap_err();
        assert!(matches!(err, NotesError::EmptyNoteRejected(_)));
        assert!(ctl.repository().store().get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_metadata_with_loaded_tags() {
        let ctl = controller(ManualBridge::new(video(), 10.0));
        let state = ctl.save_video_tags(&loaded(&ctl).await, "rust, talks").await.unwrap();
        let state = ctl.capture(&state).await.unwrap();

        let (state, note) = ctl.save_note(&state, "  intro  ", "a,b").await.unwrap();
        assert!(state.capture.is_none());
        assert_eq!(note.note, "intro");

        let meta = ctl.repository().get_metadata("abc").await.unwrap().unwrap();
        assert_eq!(meta.note_count, 1);
        assert_eq!(meta.tags, vec!["rust", "talks"]);
        assert!(meta.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_seek_without_video_is_noop() {
        let ctl = controller(ManualBridge::without_video("https://www.youtube.com/"));
        assert!(!ctl.seek(30.0).await.unwrap());

        let ctl = controller(ManualBridge::new(video(), 0.0));
        assert!(ctl.seek(30.0).await.unwrap());
        assert_eq!(ctl.bridge().position(), 30.0);
    }

    #[tokio::test]
    async fn test_declined_confirmation_touches_nothing() {
        let ctl = controller(ManualBridge::new(video(), 10.0));
        let state = ctl.capture(&loaded(&ctl).await).await.unwrap();
        let (state, note) = ctl.save_note(&state, "keep me", "").await.unwrap();

        let decline = |_: &str| false;
        assert!(!ctl.delete_note(&state, note.id.as_str(), &decline).await.unwrap());
        assert!(!ctl.clear_notes(&state, &decline).await.unwrap());
        assert!(!ctl.delete_video("abc", &decline).await.unwrap());

        assert_eq!(ctl.repository().get_notes("abc").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_note() {
        let ctl = controller(ManualBridge::new(video(), 10.0));
        let state = ctl.capture(&loaded(&ctl).await).await.unwrap();
        let (state, _) = ctl.save_note(&state, "one", "").await.unwrap();

        let accept = |_: &str| true;
        let err = ctl.delete_note(&state, "missing", &accept).await.unwrap_err();
        assert!(matches!(err, NotesError::NoteNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_video() {
        let ctl = controller(ManualBridge::new(video(), 10.0));
        let accept = |_: &str| true;
        let err = ctl.delete_video("nope", &accept).await.unwrap_err();
        assert!(matches!(err, NotesError::VideoNotFound(_)));
    }
}
