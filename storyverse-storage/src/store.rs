//! The durable store abstraction.

use async_trait::async_trait;
use storyverse_core::{PartitionMap, Story, StoryverseResult};

/// Durable, id-keyed storage of story records.
///
/// The store has no notion of partitions. `get_all_stories` rebuilds the
/// partition map from each record's own fields, so order within a
/// partition is not guaranteed to survive a round trip.
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Open or create the store. Idempotent.
    async fn init(&self) -> StoryverseResult<()>;

    /// Upsert every story by id in one transaction. Either all land or
    /// none do.
    async fn save_stories(&self, stories: &[Story]) -> StoryverseResult<()>;

    /// Every stored record, grouped by partition key.
    async fn get_all_stories(&self) -> StoryverseResult<PartitionMap>;

    /// Remove every record and marker in one transaction.
    async fn clear_database(&self) -> StoryverseResult<()>;

    /// Read a named migration marker.
    async fn migration_marker(&self, name: &str) -> StoryverseResult<Option<String>>;

    /// Write a named migration marker.
    async fn set_migration_marker(&self, name: &str, value: &str) -> StoryverseResult<()>;
}
