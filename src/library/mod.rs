//! The library view over stored notes.
//!
//! - `aggregate`: joins note collections with metadata into video entities
//! - `filter`: search text, tag text and sort order for display
//! - `transfer`: JSON export documents and import with merge semantics
//!
//! # Storage Layout
//!
//! ```text
//! timestamps_<videoId>   # [Note, ...] in append order
//! video_meta_<videoId>   # VideoMetadata
//! ```

pub mod aggregate;
pub mod filter;
pub mod transfer;

pub use aggregate::{aggregate, LibraryStats};
pub use filter::{filter_and_sort, LibraryQuery, SortKey};
pub use transfer::{
    import_document, repair_all, repair_metadata, ImportDocument, ImportShape, ImportSummary,
    LibraryExport, VideoExport, VideoRecord, LIBRARY_FORMAT_VERSION,
};
