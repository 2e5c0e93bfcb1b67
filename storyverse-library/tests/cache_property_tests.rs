//! Property-Based Tests for the Story Library
//!
//! **Property 1: set_list/get identity**
//!
//! For any partition, `get` after `set_list` returns exactly the stories
//! passed in, in the same order.
//!
//! **Property 2: update_one isolation**
//!
//! `update_one` changes only the entry with the matching id. Sibling
//! entries and every other partition are untouched.
//!
//! **Property 3: clear_all empties everything**
//!
//! After `clear_all` both the cache and the durable store are empty.

use std::sync::Arc;

use proptest::prelude::*;
use storyverse_core::{PartitionKey, Story};
use storyverse_library::StoryLibrary;
use storyverse_storage::{InMemoryStoryStore, StoryStore};
use storyverse_test_utils::generators::{arb_partition, arb_partition_key};
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn keyed_partition() -> impl Strategy<Value = (PartitionKey, Vec<Story>)> {
    arb_partition_key().prop_flat_map(|key| (Just(key), arb_partition(key, 10)))
}

/// Two distinct partitions with their stories.
fn two_partitions() -> impl Strategy<Value = ((PartitionKey, Vec<Story>), (PartitionKey, Vec<Story>))> {
    (keyed_partition(), keyed_partition()).prop_filter("distinct partitions", |(a, b)| a.0 != b.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_set_list_then_get_is_identity((key, stories) in keyed_partition()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let library = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
            library.set_list(key, stories.clone()).map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(
                library.get(key.category, key.age, key.language),
                stories
            );
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_update_one_touches_only_its_story(
        ((key, stories), (other_key, other_stories)) in two_partitions(),
        pick in any::<prop::sample::Index>(),
        new_title in "[A-Z][a-z]{3,10}",
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let library = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
            library.set_list(key, stories.clone()).map_err(|e| TestCaseError::fail(e.to_string()))?;
            library.set_list(other_key, other_stories.clone()).map_err(|e| TestCaseError::fail(e.to_string()))?;

            let target = pick.index(stories.len());
            let mut edited = stories[target].clone();
            edited.title = new_title.clone();
            prop_assert!(library.update_one(edited.clone()));

            let after = library.get_by_key(&key);
            prop_assert_eq!(after.len(), stories.len());
            for (i, (before, now)) in stories.iter().zip(after.iter()).enumerate() {
                if i == target {
                    prop_assert_eq!(now, &edited);
                } else {
                    prop_assert_eq!(now, before);
                }
            }
            prop_assert_eq!(library.get_by_key(&other_key), other_stories);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_clear_all_empties_cache_and_store((key, stories) in keyed_partition()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(InMemoryStoryStore::new());
            let library = StoryLibrary::empty(store.clone());
            library.set_list(key, stories).map_err(|e| TestCaseError::fail(e.to_string()))?;

            library.clear_all().await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(library.story_count(), 0);
            let stored = store.get_all_stories().await.map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(stored.is_empty());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
