//! In-process story store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use storyverse_core::{group_by_partition, PartitionMap, Story, StorageError, StoryverseResult};

use crate::store::StoryStore;

#[derive(Default)]
struct Contents {
    // Insertion order is kept so restored partitions read back in
    // generation order.
    stories: Vec<Story>,
    markers: HashMap<String, String>,
}

/// Story store held entirely in memory. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryStoryStore {
    contents: RwLock<Contents>,
}

impl InMemoryStoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.contents.read().map(|c| c.stories.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable {
        reason: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl StoryStore for InMemoryStoryStore {
    async fn init(&self) -> StoryverseResult<()> {
        Ok(())
    }

    async fn save_stories(&self, stories: &[Story]) -> StoryverseResult<()> {
        let mut contents = self.contents.write().map_err(|_| poisoned())?;
        for story in stories {
            match contents.stories.iter_mut().find(|s| s.id == story.id) {
                Some(existing) => *existing = story.clone(),
                None => contents.stories.push(story.clone()),
            }
        }
        Ok(())
    }

    async fn get_all_stories(&self) -> StoryverseResult<PartitionMap> {
        let contents = self.contents.read().map_err(|_| poisoned())?;
        Ok(group_by_partition(contents.stories.iter().cloned()))
    }

    async fn clear_database(&self) -> StoryverseResult<()> {
        let mut contents = self.contents.write().map_err(|_| poisoned())?;
        contents.stories.clear();
        contents.markers.clear();
        Ok(())
    }

    async fn migration_marker(&self, name: &str) -> StoryverseResult<Option<String>> {
        let contents = self.contents.read().map_err(|_| poisoned())?;
        Ok(contents.markers.get(name).cloned())
    }

    async fn set_migration_marker(&self, name: &str, value: &str) -> StoryverseResult<()> {
        let mut contents = self.contents.write().map_err(|_| poisoned())?;
        contents.markers.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyverse_core::{AgeBracket, Language, PartitionKey, StoryCategory, StoryId, StoryMetadata};

    fn story(id: &str) -> Story {
        Story::from_metadata(
            StoryMetadata {
                id: StoryId::from(id),
                title: id.to_string(),
                summary: String::new(),
            },
            PartitionKey::new(StoryCategory::Family, AgeBracket::EarlyGrade, Language::French),
        )
    }

    #[tokio::test]
    async fn test_upsert_keeps_first_position() {
        let store = InMemoryStoryStore::new();
        store.save_stories(&[story("x"), story("y")]).await.unwrap();
        store
            .save_stories(&[story("x").with_content("hello".to_string())])
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        let all = store.get_all_stories().await.unwrap();
        let list = all.values().next().unwrap();
        assert_eq!(list[0].id.as_str(), "x");
        assert_eq!(list[0].word_count, Some(1));
        assert_eq!(list[1].id.as_str(), "y");
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStoryStore::new();
        store.save_stories(&[story("x")]).await.unwrap();
        store.set_migration_marker("k", "v").await.unwrap();
        store.clear_database().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.migration_marker("k").await.unwrap(), None);
    }
}
