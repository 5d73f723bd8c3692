//! Error types for the notes library.

use thiserror::Error;

/// Errors raised by the repository, engines and command handlers
#[derive(Debug, Error)]
pub enum NotesError {
    #[error("No video element found on the current page")]
    NoActiveVideo,

    #[error("Not a supported video page: {url}")]
    NotVideoPlatform { url: String },

    #[error("Frame capture failed: {0}")]
    FrameCaptureFailed(String),

    #[error("Malformed import document: {0}")]
    MalformedImportDocument(String),

    #[error("Note rejected: {0}")]
    EmptyNoteRejected(String),

    #[error("Note {note_id} not found for video {video_id}")]
    NoteNotFound { video_id: String, note_id: String },

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type NotesResult<T> = Result<T, NotesError>;

impl NotesError {
    /// Status line shown to the user when an action fails
    pub fn status_message(&self) -> String {
        match self {
            NotesError::NoActiveVideo => "Open a video to take notes".to_string(),
            NotesError::NotVideoPlatform { .. } => {
                "Capture is only available on supported video pages".to_string()
            }
            NotesError::FrameCaptureFailed(_) => {
                "Could not capture a frame, using the video thumbnail instead".to_string()
            }
            NotesError::MalformedImportDocument(reason) => format!("Import failed: {}", reason),
            NotesError::EmptyNoteRejected(reason) => reason.clone(),
            NotesError::NoteNotFound { .. } => "That note no longer exists".to_string(),
            NotesError::VideoNotFound(id) => format!("No notes saved for video {}", id),
            NotesError::Io(_) | NotesError::Serialization(_) | NotesError::Storage(_) => {
                format!("Storage failure: {}", self)
            }
        }
    }
}

impl From<rusqlite::Error> for NotesError {
    fn from(err: rusqlite::Error) -> Self {
        NotesError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for NotesError {
    fn from(err: tokio::task::JoinError) -> Self {
        NotesError::Storage(format!("background task failed: {}", err))
    }
}
