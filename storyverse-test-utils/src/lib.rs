//! Storyverse Test Utilities
//!
//! Shared test infrastructure for the Storyverse workspace:
//! - A scripted story generator with call counters
//! - A story store that always fails
//! - Proptest generators for the domain types
//! - Fixtures and assertions

pub use storyverse_core::{
    AgeBracket, GenerationError, ImageRef, Language, LlmError, PartitionKey, PartitionMap, StorageError,
    Story, StoryCategory, StoryId, StoryMetadata, StoryverseError, StoryverseResult,
};
pub use storyverse_llm::StoryGenerator;
pub use storyverse_storage::{InMemoryStoryStore, StoryStore};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// SCRIPTED GENERATOR
// ============================================================================

/// Outcome of one scripted list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    /// Return this many stories.
    Stories(usize),
    Fail,
    /// The provider rejects the credential.
    NotConfigured,
}

/// Outcome of one scripted cover call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverOutcome {
    Image,
    /// The model answered without a picture.
    NoImage,
    Fail,
}

/// Outcome of one scripted full-story call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    Text(String),
    Fail,
}

/// A [`StoryGenerator`] that plays back scripted outcomes in call order.
///
/// Once a script runs out, calls succeed with default output. Every call
/// is counted and its arguments recorded.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    list_script: Mutex<VecDeque<ListOutcome>>,
    cover_script: Mutex<VecDeque<CoverOutcome>>,
    content_script: Mutex<VecDeque<ContentOutcome>>,
    list_size: Option<usize>,
    call_delay: Duration,
    list_calls: AtomicUsize,
    content_calls: AtomicUsize,
    cover_calls: AtomicUsize,
    analyze_calls: AtomicUsize,
    list_keys: Mutex<Vec<PartitionKey>>,
    cover_titles: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Stories per list when the script is exhausted.
    pub const DEFAULT_LIST_SIZE: usize = 3;
    pub const DEFAULT_ANALYSIS: &'static str = "A picture of a friendly dragon.";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list_outcomes(self, outcomes: impl IntoIterator<Item = ListOutcome>) -> Self {
        lock(&self.list_script).extend(outcomes);
        self
    }

    pub fn with_cover_outcomes(self, outcomes: impl IntoIterator<Item = CoverOutcome>) -> Self {
        lock(&self.cover_script).extend(outcomes);
        self
    }

    pub fn with_content_outcomes(self, outcomes: impl IntoIterator<Item = ContentOutcome>) -> Self {
        lock(&self.content_script).extend(outcomes);
        self
    }

    /// Default number of stories per successful list.
    pub fn with_list_size(mut self, size: usize) -> Self {
        self.list_size = Some(size);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    pub fn cover_calls(&self) -> usize {
        self.cover_calls.load(Ordering::SeqCst)
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    /// Partition of every list call, in call order.
    pub fn list_keys(&self) -> Vec<PartitionKey> {
        lock(&self.list_keys).clone()
    }

    /// Title of every cover call, in call order.
    pub fn cover_titles(&self) -> Vec<String> {
        lock(&self.cover_titles).clone()
    }

    async fn pause(&self) {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
    }
}

#[async_trait]
impl StoryGenerator for ScriptedGenerator {
    async fn generate_story_list(
        &self,
        category: StoryCategory,
        age: AgeBracket,
        language: Language,
    ) -> StoryverseResult<Vec<StoryMetadata>> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        let key = PartitionKey::new(category, age, language);
        lock(&self.list_keys).push(key);
        self.pause().await;

        let outcome = lock(&self.list_script).pop_front().unwrap_or(ListOutcome::Stories(
            self.list_size.unwrap_or(Self::DEFAULT_LIST_SIZE),
        ));
        match outcome {
            ListOutcome::Stories(count) => Ok((0..count)
                .map(|position| StoryMetadata {
                    id: StoryId::generate(&key, position, call as i64),
                    title: format!("{} story {}", category.slug(), position + 1),
                    summary: format!("Generated on call {}.", call + 1),
                })
                .collect()),
            ListOutcome::Fail => Err(GenerationError::ListFailed {
                reason: format!("scripted failure on call {}", call + 1),
            }
            .into()),
            ListOutcome::NotConfigured => Err(LlmError::ProviderNotConfigured.into()),
        }
    }

    async fn generate_full_story(
        &self,
        title: &str,
        _summary: &str,
        _age: AgeBracket,
        _language: Language,
        _category: StoryCategory,
    ) -> StoryverseResult<String> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let outcome = lock(&self.content_script)
            .pop_front()
            .unwrap_or_else(|| ContentOutcome::Text(format!("Once upon a time, {} began.", title)));
        match outcome {
            ContentOutcome::Text(text) => Ok(text),
            ContentOutcome::Fail => Err(GenerationError::ContentFailed {
                reason: "scripted failure".to_string(),
            }
            .into()),
        }
    }

    async fn generate_cover_image(
        &self,
        title: &str,
        _summary: &str,
        _category: StoryCategory,
    ) -> StoryverseResult<Option<ImageRef>> {
        let call = self.cover_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.cover_titles).push(title.to_string());
        self.pause().await;

        match lock(&self.cover_script).pop_front().unwrap_or(CoverOutcome::Image) {
            CoverOutcome::Image => Ok(Some(fixtures::test_image(call as u8))),
            CoverOutcome::NoImage => Ok(None),
            CoverOutcome::Fail => Err(GenerationError::CoverFailed {
                reason: format!("scripted failure on call {}", call + 1),
            }
            .into()),
        }
    }

    async fn analyze_image(&self, _image: &ImageRef, _prompt: &str) -> String {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Self::DEFAULT_ANALYSIS.to_string()
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// Which operations a [`FailingStore`] rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Even `init` fails.
    Unavailable,
    /// Opens and reads fine; every write fails.
    WritesFail,
}

/// A story store that fails on purpose and counts write attempts.
#[derive(Debug)]
pub struct FailingStore {
    mode: FailureMode,
    save_attempts: AtomicUsize,
    clear_attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            save_attempts: AtomicUsize::new(0),
            clear_attempts: AtomicUsize::new(0),
        }
    }

    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    pub fn clear_attempts(&self) -> usize {
        self.clear_attempts.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> StoryverseResult<()> {
        match self.mode {
            FailureMode::Unavailable => Err(StorageError::Unavailable {
                reason: "store configured to be unavailable".to_string(),
            }
            .into()),
            FailureMode::WritesFail => Ok(()),
        }
    }

    fn write_error() -> StoryverseError {
        StorageError::TransactionFailed {
            reason: "store configured to reject writes".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl StoryStore for FailingStore {
    async fn init(&self) -> StoryverseResult<()> {
        self.check_open()
    }

    async fn save_stories(&self, _stories: &[Story]) -> StoryverseResult<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;
        Err(Self::write_error())
    }

    async fn get_all_stories(&self) -> StoryverseResult<PartitionMap> {
        self.check_open()?;
        Ok(PartitionMap::new())
    }

    async fn clear_database(&self) -> StoryverseResult<()> {
        self.clear_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;
        Err(Self::write_error())
    }

    async fn migration_marker(&self, _name: &str) -> StoryverseResult<Option<String>> {
        self.check_open()?;
        Ok(None)
    }

    async fn set_migration_marker(&self, _name: &str, _value: &str) -> StoryverseResult<()> {
        self.check_open()?;
        Err(Self::write_error())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Storyverse domain types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_category() -> impl Strategy<Value = StoryCategory> {
        prop::sample::select(StoryCategory::ALL.to_vec())
    }

    pub fn arb_age() -> impl Strategy<Value = AgeBracket> {
        prop::sample::select(AgeBracket::ALL.to_vec())
    }

    pub fn arb_language() -> impl Strategy<Value = Language> {
        prop::sample::select(Language::ALL.to_vec())
    }

    pub fn arb_partition_key() -> impl Strategy<Value = PartitionKey> {
        (arb_category(), arb_age(), arb_language()).prop_map(|(c, a, l)| PartitionKey::new(c, a, l))
    }

    /// A story in `key` with optional content and cover. Ids come from
    /// `position`, so callers control uniqueness.
    pub fn arb_story(key: PartitionKey, position: usize) -> impl Strategy<Value = Story> {
        (
            "[A-Z][a-z]{2,12}( [a-z]{2,8}){0,3}",
            "[A-Z][a-z ]{5,40}\\.",
            proptest::option::of("[A-Za-z ]{10,80}"),
            any::<bool>(),
        )
            .prop_map(move |(title, summary, content, covered)| {
                let mut story = fixtures::make_story_titled(key, position, &title);
                story.summary = summary;
                if let Some(content) = content {
                    story = story.with_content(content);
                }
                if covered {
                    story.cover_image = Some(fixtures::test_image(position as u8));
                }
                story
            })
    }

    /// A list of 1..=max stories in `key` with distinct ids.
    pub fn arb_partition(key: PartitionKey, max: usize) -> impl Strategy<Value = Vec<Story>> {
        (1..=max.max(1)).prop_flat_map(move |len| {
            (0..len).map(|position| arb_story(key, position)).collect::<Vec<_>>()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built stories and blobs for common scenarios.

    use super::*;

    /// A story at `position` of `key`'s partition.
    pub fn make_story(key: PartitionKey, position: usize) -> Story {
        make_story_titled(key, position, &format!("Story {}", position + 1))
    }

    pub fn make_story_titled(key: PartitionKey, position: usize, title: &str) -> Story {
        Story::from_metadata(
            StoryMetadata {
                id: StoryId::generate(&key, position, 1_700_000_000_000),
                title: title.to_string(),
                summary: format!("A {} tale.", key.category.slug()),
            },
            key,
        )
    }

    /// `count` stories in `key`'s partition, without content or covers.
    pub fn make_partition(key: PartitionKey, count: usize) -> Vec<Story> {
        (0..count).map(|position| make_story(key, position)).collect()
    }

    /// A tiny distinct image.
    pub fn test_image(seed: u8) -> ImageRef {
        ImageRef::from_bytes("image/png", &[0x89, b'P', b'N', b'G', seed])
    }

    /// Stories in the legacy single-blob JSON shape.
    pub fn legacy_blob(stories: &[Story]) -> String {
        let grouped = storyverse_core::group_by_partition(stories.iter().cloned());
        serde_json::to_string(&grouped).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn key(category: StoryCategory, age: AgeBracket, language: Language) -> PartitionKey {
        PartitionKey::new(category, age, language)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Storyverse-specific results.

    use super::*;

    /// Assert that a result is a storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &StoryverseResult<T>) {
        match result {
            Err(StoryverseError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a result is a list generation failure.
    #[track_caller]
    pub fn assert_list_failed<T: std::fmt::Debug>(result: &StoryverseResult<T>) {
        match result {
            Err(StoryverseError::Generation(GenerationError::ListFailed { .. })) => {}
            other => panic!("Expected ListFailed, got: {:?}", other),
        }
    }

    /// Assert every story sits in the partition derived from its own fields.
    #[track_caller]
    pub fn assert_partitioned(map: &PartitionMap) {
        for (key, stories) in map {
            for story in stories {
                assert_eq!(
                    story.partition_key(),
                    *key,
                    "story {} filed under the wrong partition",
                    story.id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> PartitionKey {
        fixtures::key(StoryCategory::Space, AgeBracket::Toddler, Language::English)
    }

    #[tokio::test]
    async fn test_scripted_list_plays_back_then_defaults() {
        let gen = ScriptedGenerator::new().with_list_outcomes([ListOutcome::Fail, ListOutcome::Stories(1)]);

        assert!(gen
            .generate_story_list(StoryCategory::Space, AgeBracket::Toddler, Language::English)
            .await
            .is_err());
        let one = gen
            .generate_story_list(StoryCategory::Space, AgeBracket::Toddler, Language::English)
            .await
            .unwrap();
        let default = gen
            .generate_story_list(StoryCategory::Space, AgeBracket::Toddler, Language::English)
            .await
            .unwrap();

        assert_eq!(one.len(), 1);
        assert_eq!(default.len(), ScriptedGenerator::DEFAULT_LIST_SIZE);
        assert_eq!(gen.list_calls(), 3);
        assert_eq!(gen.list_keys(), vec![space(); 3]);
        // Ids differ across calls.
        assert_ne!(one[0].id, default[0].id);
    }

    #[tokio::test]
    async fn test_scripted_cover() {
        let gen = ScriptedGenerator::new().with_cover_outcomes([CoverOutcome::NoImage, CoverOutcome::Fail]);
        assert_eq!(gen.generate_cover_image("a", "", StoryCategory::Magic).await.unwrap(), None);
        assert!(gen.generate_cover_image("b", "", StoryCategory::Magic).await.is_err());
        assert!(gen.generate_cover_image("c", "", StoryCategory::Magic).await.unwrap().is_some());
        assert_eq!(gen.cover_titles(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failing_store_modes() {
        let down = FailingStore::new(FailureMode::Unavailable);
        assertions::assert_storage_error(&down.init().await);

        let read_only = FailingStore::new(FailureMode::WritesFail);
        assert!(read_only.init().await.is_ok());
        assertions::assert_storage_error(&read_only.save_stories(&[]).await);
        assert_eq!(read_only.save_attempts(), 1);
    }

    #[test]
    fn test_make_partition_ids_distinct() {
        let stories = fixtures::make_partition(space(), 5);
        let mut ids: Vec<_> = stories.iter().map(|s| s.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
}
