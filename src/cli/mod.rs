//! Command-line interface for vidnotes.
//!
//! Provides commands for taking notes on a video, browsing and filtering the
//! library, editing tags, deleting notes and videos, and moving the library
//! in and out as JSON.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::bridge::ManualBridge;
use crate::config;
use crate::controller::{Confirm, Controller};
use crate::domain::{format_time, parse_time, timestamp_url, VideoIdentity};
use crate::error::NotesError;
use crate::library::{ImportShape, LibraryQuery, SortKey};
use crate::repository::{KvNoteRepository, NoteRepository};
use crate::session::{LoadedVideo, SessionState};
use crate::store::open_store;

type CliController = Controller<KvNoteRepository, ManualBridge>;

/// vidnotes - Timestamped notes on videos
#[derive(Parser, Debug)]
#[command(name = "vidnotes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save a note at a position in a video
    Add {
        /// Video ID
        video_id: String,

        /// Position: seconds, M:SS or H:MM:SS
        #[arg(short = 'a', long = "at")]
        time: String,

        /// Note text
        note: String,

        /// Tags to apply (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,

        /// Video title
        #[arg(long)]
        title: Option<String>,

        /// Video URL (defaults to the YouTube watch URL)
        #[arg(long)]
        url: Option<String>,

        /// Image file to store as the captured frame
        #[arg(short, long)]
        frame: Option<PathBuf>,
    },

    /// List the notes of a video, ordered by time
    Notes {
        /// Video ID
        video_id: String,

        /// Only notes whose text or tags contain this
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List videos in the library
    Library {
        /// Match titles and note text
        #[arg(short, long)]
        search: Option<String>,

        /// Match video and note tags
        #[arg(short, long)]
        tag: Option<String>,

        /// recent, oldest, title or notes
        #[arg(long)]
        sort: Option<String>,

        /// Maximum number of videos to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show library totals
    Stats,

    /// Replace the tags of a video
    Tags {
        /// Video ID
        video_id: String,

        /// Tags (comma-separated, empty to clear)
        tags: String,
    },

    /// Delete one note
    DeleteNote {
        /// Video ID
        video_id: String,

        /// Note ID
        note_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a video and all its notes
    DeleteVideo {
        /// Video ID
        video_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete every note of a video
    Clear {
        /// Video ID
        video_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export one video as JSON
    Export {
        /// Video ID
        video_id: String,

        /// Output file (defaults to a timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the whole library as JSON
    ExportAll {
        /// Output file (defaults to a timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a single-video or full-library export
    Import {
        /// JSON file to import
        file: PathBuf,
    },

    /// Bring cached note counts back in line with stored notes
    Repair,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Add {
                video_id,
                time,
                note,
                tags,
                title,
                url,
                frame,
            } => add_note(&video_id, &time, &note, tags, title, url, frame).await,
            Commands::Notes { video_id, filter } => list_notes(&video_id, filter).await,
            Commands::Library {
                search,
                tag,
                sort,
                limit,
            } => list_library(search, tag, sort, limit).await,
            Commands::Stats => show_stats().await,
            Commands::Tags { video_id, tags } => set_tags(&video_id, &tags).await,
            Commands::DeleteNote {
                video_id,
                note_id,
                yes,
            } => delete_note(&video_id, &note_id, yes).await,
            Commands::DeleteVideo { video_id, yes } => delete_video(&video_id, yes).await,
            Commands::Clear { video_id, yes } => clear_notes(&video_id, yes).await,
            Commands::Export { video_id, output } => export_video(&video_id, output).await,
            Commands::ExportAll { output } => export_library(output).await,
            Commands::Import { file } => import_file(&file).await,
            Commands::Repair => repair().await,
            Commands::Config => show_config(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Turn a library error into an anyhow error headed by its status line
fn status(err: NotesError) -> anyhow::Error {
    let message = err.status_message();
    anyhow::Error::new(err).context(message)
}

/// Confirmation read from stdin, or skipped with --yes
struct PromptConfirm {
    assume_yes: bool,
}

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        eprint!("{} [y/N] ", prompt);
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn default_video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

async fn open_controller(bridge: ManualBridge) -> Result<CliController> {
    let cfg = config::config()?;
    let store = open_store(cfg.backend, &cfg.store_path)
        .await
        .map_err(status)
        .with_context(|| format!("Failed to open store: {}", cfg.store_path.display()))?;

    Ok(Controller::with_settings(
        KvNoteRepository::new(store),
        bridge,
        cfg.controller_settings(),
    ))
}

/// Controller for commands that never talk to a video page
async fn library_controller() -> Result<CliController> {
    open_controller(ManualBridge::without_video("")).await
}

/// Session with `video_id` loaded from stored metadata
async fn session_for(controller: &CliController, video_id: &str) -> Result<SessionState> {
    let meta = controller
        .repository()
        .get_metadata(video_id)
        .await
        .map_err(status)?;

    let (identity, tags) = match meta {
        Some(m) => (VideoIdentity::new(video_id, m.title, m.url), m.tags),
        None => (
            VideoIdentity::new(video_id, "", default_video_url(video_id)),
            Vec::new(),
        ),
    };

    Ok(SessionState::new().with_video(LoadedVideo { identity, tags }))
}

async fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Capture a position and save a note there
async fn add_note(
    video_id: &str,
    time: &str,
    text: &str,
    tags: Option<String>,
    title: Option<String>,
    url: Option<String>,
    frame: Option<PathBuf>,
) -> Result<()> {
    let time = parse_time(time)
        .with_context(|| format!("Invalid position '{}': use seconds, M:SS or H:MM:SS", time))?;
    let identity = VideoIdentity::new(
        video_id,
        title.unwrap_or_default(),
        url.unwrap_or_else(|| default_video_url(video_id)),
    );

    let mut bridge = ManualBridge::new(identity, time);
    if let Some(frame) = frame {
        bridge = bridge.with_frame(frame);
    }
    let controller = open_controller(bridge).await?;

    let state = controller
        .load_video(&SessionState::new())
        .await
        .map_err(status)?;
    let state = controller.capture(&state).await.map_err(status)?;
    let (_, note) = controller
        .save_note(&state, text, tags.as_deref().unwrap_or(""))
        .await
        .map_err(status)?;

    eprintln!("✅ Note saved at {}", format_time(note.time));
    println!("{}", note.id);
    Ok(())
}

/// List the notes of one video
async fn list_notes(video_id: &str, filter: Option<String>) -> Result<()> {
    let controller = library_controller().await?;
    let state = session_for(&controller, video_id).await?;
    let notes = controller
        .current_notes(&state, filter.as_deref().unwrap_or(""))
        .await
        .map_err(status)?;

    if notes.is_empty() {
        println!("No notes saved for this video yet");
        return Ok(());
    }

    println!("{:<10} {:<38} {}", "TIME", "ID", "NOTE");
    println!("{}", "-".repeat(80));

    for note in &notes {
        println!(
            "{:<10} {:<38} {}",
            format_time(note.time),
            note.id.as_str(),
            note.note
        );
        if !note.tags.is_empty() {
            println!("{:<49} #{}", "", note.tags.join(" #"));
        }
    }

    if let Some(video) = &state.video {
        if !video.identity.url.is_empty() {
            println!("\nJump to first: {}", timestamp_url(&video.identity.url, notes[0].time));
        }
    }

    Ok(())
}

/// List videos in the library
async fn list_library(
    search: Option<String>,
    tag: Option<String>,
    sort: Option<String>,
    limit: usize,
) -> Result<()> {
    let cfg = config::config()?;
    let controller = library_controller().await?;

    let sort_key = sort.as_deref().map(SortKey::parse).unwrap_or(cfg.default_sort);
    let query = LibraryQuery::new(search.unwrap_or_default(), tag.unwrap_or_default(), sort_key);
    let view = controller.library_view(&query).await.map_err(status)?;

    if view.total_videos == 0 {
        println!("Library is empty. Use 'vidnotes add <video-id>' to take a note.");
        return Ok(());
    }

    println!("{:<14} {:<6} {:<12} {:<46}", "VIDEO", "NOTES", "UPDATED", "TITLE");
    println!("{}", "-".repeat(80));

    for entity in view.entities.iter().take(limit) {
        println!(
            "{:<14} {:<6} {:<12} {:<46}",
            truncate(&entity.video_id, 14),
            entity.note_count,
            entity.updated_at.format("%Y-%m-%d").to_string(),
            truncate(&entity.title, 46)
        );
        if !entity.tags.is_empty() {
            println!("{:<34} #{}", "", entity.tags.join(" #"));
        }
    }

    println!(
        "\nShowing {} of {} videos ({})",
        view.entities.len().min(limit),
        view.total_videos,
        view.stats
    );

    Ok(())
}

/// Show library totals
async fn show_stats() -> Result<()> {
    let controller = library_controller().await?;
    let view = controller
        .library_view(&LibraryQuery::default())
        .await
        .map_err(status)?;

    println!("Videos: {}", view.stats.videos);
    println!("Notes:  {}", view.stats.notes);
    println!("Tags:   {}", view.stats.tags);
    Ok(())
}

/// Replace the tags of a video
async fn set_tags(video_id: &str, tags: &str) -> Result<()> {
    let controller = library_controller().await?;
    let state = session_for(&controller, video_id).await?;
    let state = controller
        .save_video_tags(&state, tags)
        .await
        .map_err(status)?;

    let tags = state.video.map(|v| v.tags).unwrap_or_default();
    if tags.is_empty() {
        eprintln!("✅ Tags cleared for {}", video_id);
    } else {
        eprintln!("✅ Tags for {}: {}", video_id, tags.join(", "));
    }
    Ok(())
}

async fn delete_note(video_id: &str, note_id: &str, yes: bool) -> Result<()> {
    let controller = library_controller().await?;
    let state = session_for(&controller, video_id).await?;
    let confirm = PromptConfirm { assume_yes: yes };

    if controller
        .delete_note(&state, note_id, &confirm)
        .await
        .map_err(status)?
    {
        eprintln!("🗑  Note deleted");
    } else {
        eprintln!("Cancelled");
    }
    Ok(())
}

async fn delete_video(video_id: &str, yes: bool) -> Result<()> {
    let controller = library_controller().await?;
    let confirm = PromptConfirm { assume_yes: yes };

    if controller
        .delete_video(video_id, &confirm)
        .await
        .map_err(status)?
    {
        eprintln!("🗑  Video {} deleted", video_id);
    } else {
        eprintln!("Cancelled");
    }
    Ok(())
}

async fn clear_notes(video_id: &str, yes: bool) -> Result<()> {
    let controller = library_controller().await?;
    let state = session_for(&controller, video_id).await?;
    let confirm = PromptConfirm { assume_yes: yes };

    if controller
        .clear_notes(&state, &confirm)
        .await
        .map_err(status)?
    {
        eprintln!("🗑  All notes for {} deleted", video_id);
    } else {
        eprintln!("Cancelled");
    }
    Ok(())
}

async fn export_video(video_id: &str, output: Option<PathBuf>) -> Result<()> {
    let controller = library_controller().await?;
    let export = controller.export_video(video_id).await.map_err(status)?;

    let path = output.unwrap_or_else(|| PathBuf::from(export.file_name()));
    write_json(&export, &path).await?;

    eprintln!(
        "📤 Exported {} notes to {}",
        export.timestamps.len(),
        path.display()
    );
    Ok(())
}

async fn export_library(output: Option<PathBuf>) -> Result<()> {
    let controller = library_controller().await?;
    let export = controller.export_library().await.map_err(status)?;

    let path = output.unwrap_or_else(|| PathBuf::from(export.file_name()));
    write_json(&export, &path).await?;

    eprintln!(
        "📤 Exported {} videos to {}",
        export.videos.len(),
        path.display()
    );
    Ok(())
}

async fn import_file(file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| status(NotesError::MalformedImportDocument(e.to_string())))?;

    let controller = library_controller().await?;
    let summary = controller
        .import_document(&document)
        .await
        .map_err(status)?;

    let shape = match &summary.shape {
        ImportShape::Single => "single video".to_string(),
        ImportShape::Library { version } => format!("library v{}", version),
    };
    eprintln!(
        "📥 Imported {} notes across {} videos ({})",
        summary.notes,
        summary.video_ids.len(),
        shape
    );
    Ok(())
}

async fn repair() -> Result<()> {
    let controller = library_controller().await?;
    let repaired = controller.repair_metadata().await.map_err(status)?;

    if repaired.is_empty() {
        println!("All metadata is consistent");
    } else {
        for id in &repaired {
            println!("Repaired {}", id);
        }
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("vidnotes configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Store:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Backend:  {}", cfg.backend);
    println!("  Path:     {}", cfg.store_path.display());
    println!();
    println!("Library:");
    println!("  Default sort: {}", cfg.default_sort);
    println!();
    println!("Video pages:");
    println!("  Hosts:     {}", cfg.hosts.join(", "));
    println!("  Thumbnail: {}", cfg.thumbnail_url);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_command() {
        let cli = Cli::try_parse_from([
            "vidnotes", "add", "abc123", "--at", "1:05", "Great point", "--tags", "rust,async",
        ])
        .unwrap();

        match cli.command {
            Commands::Add {
                video_id,
                time,
                note,
                tags,
                ..
            } => {
                assert_eq!(video_id, "abc123");
                assert_eq!(parse_time(&time), Some(65.0));
                assert_eq!(note, "Great point");
                assert_eq!(tags.as_deref(), Some("rust,async"));
            }
            other => panic!("Expected add, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_destructive_flags() {
        let cli = Cli::try_parse_from(["vidnotes", "delete-video", "abc", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::DeleteVideo { yes: true, .. }));

        let cli = Cli::try_parse_from(["vidnotes", "clear", "abc"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear { yes: false, .. }));
    }

    #[test]
    fn test_status_heads_error_chain() {
        let err = status(NotesError::NoActiveVideo);
        assert_eq!(err.to_string(), "Open a video to take notes");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
    }
}
