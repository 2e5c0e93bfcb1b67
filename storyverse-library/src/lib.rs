//! Storyverse Library
//!
//! The in-memory story cache and everything that acts on one story or one
//! partition at a time:
//! - [`StoryLibrary`]: partition map, ordered fire-and-forget persistence,
//!   change notifications
//! - [`StoryService`]: list generation, lazy reading, covers, image analysis
//! - [`LibraryStats`] and JSON backups

pub mod backup;
pub mod cache;
pub mod service;
pub mod stats;

pub use backup::{backup_file_name, export_backup, import_backup, BackupSummary};
pub use cache::{PersistenceMetrics, PersistenceSnapshot, StoryLibrary};
pub use service::{
    begin_cover, durable_copy, finish_cover, generate_list, has_generated_content, paint_cover,
    PaintOutcome, PaintSummary, StoryService, CONTENT_ERROR_PLACEHOLDER,
};
pub use stats::{CategoryCount, LibraryStats};
