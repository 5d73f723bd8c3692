//! vidnotes - Timestamped notes on videos
//!
//! Keeps per-video collections of timestamped notes in a key-value store and
//! builds a searchable library view over them.
//!
//! # Architecture
//!
//! Notes and video metadata are stored separately, keyed by video id:
//! - Note collections are append-only lists, never edited in place
//! - The library view is derived by joining notes with metadata on demand
//! - Export documents carry the notes verbatim, so import restores them exactly
//!
//! # Modules
//!
//! - `domain`: Data structures (Note, VideoMetadata, VideoEntity)
//! - `store`: Key-value backends (memory, JSON file, SQLite)
//! - `repository`: Typed access to notes and metadata with per-video locks
//! - `library`: Aggregation, filtering/sorting, export/import
//! - `bridge`: Video page interface (position, seek, frame capture)
//! - `session`, `controller`: UI-agnostic command handlers
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Save a note two minutes into a video
//! vidnotes add dQw4w9WgXcQ --at 2:00 "Chorus starts" --tags music
//!
//! # Browse the library
//! vidnotes library --tag music --sort title
//!
//! # Back up everything
//! vidnotes export-all --output notes.json
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod library;
pub mod repository;
pub mod session;
pub mod store;

// Re-export main types at crate root for convenience
pub use bridge::{FrameCapture, ManualBridge, VideoBridge, VideoInfo};
pub use controller::{Confirm, Controller, ControllerSettings, LibraryView};
pub use domain::{Note, NoteId, VideoEntity, VideoIdentity, VideoMetadata};
pub use error::{NotesError, NotesResult};
pub use library::{LibraryExport, LibraryQuery, LibraryStats, SortKey, VideoExport};
pub use repository::{KvNoteRepository, NoteRepository};
pub use session::SessionState;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, SqliteStore, StoreBackend};
