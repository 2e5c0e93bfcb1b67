//! Storyverse Storage
//!
//! Durable story persistence. The [`StoryStore`] trait is implemented by an
//! LMDB store for real use and an in-memory store for tests. Startup goes
//! through [`restore_library`], which also migrates the legacy cache blob.

mod legacy;
mod lmdb;
mod memory;
mod restore;
mod store;

pub use legacy::{parse_legacy_cache, LegacySlot};
pub use lmdb::LmdbStoryStore;
pub use memory::InMemoryStoryStore;
pub use restore::{restore_library, RestoreSource, RestoredLibrary, LEGACY_DIGEST_MARKER};
pub use store::StoryStore;
