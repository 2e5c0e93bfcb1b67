//! Storyverse LLM - Story Generation Client
//!
//! The [`StoryGenerator`] trait is the seam between the library and the
//! generative provider. Prompts and response parsing live here too, so a
//! provider only has to move bytes. No call is retried; callers decide
//! whether to skip, retry, or give up.

use async_trait::async_trait;
use storyverse_core::{
    AgeBracket, ImageRef, Language, StoryCategory, StoryMetadata, StoryverseResult,
};

pub mod parse;
pub mod prompts;
pub mod providers;

pub use providers::{GeminiClient, GeminiModels, GeminiStoryGenerator};

/// Returned when the model answers a full-story request with nothing.
pub const FULL_STORY_FALLBACK: &str = "Sorry, I couldn't generate the story content at this time.";

/// Returned when image analysis fails for any reason.
pub const ANALYZE_FAILURE_FALLBACK: &str =
    "Sorry, I had trouble seeing that image clearly. Please try again.";

/// Returned when image analysis succeeds but yields no text.
pub const ANALYZE_EMPTY_FALLBACK: &str = "I could not analyze the image.";

/// Prompt used when the caller supplies a blank one.
pub const DEFAULT_ANALYZE_PROMPT: &str = "Describe this image in a way that a child would understand.";

// ============================================================================
// STORY GENERATOR TRAIT
// ============================================================================

/// Generates story lists, full stories, covers, and image descriptions.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Request a batch of story titles and summaries.
    ///
    /// # Returns
    /// * `Ok(Vec<StoryMetadata>)` - Stories with ids unique within the batch
    /// * `Err(GenerationError::ListFailed)` - Call failed, or the response
    ///   was empty or unparseable
    async fn generate_story_list(
        &self,
        category: StoryCategory,
        age: AgeBracket,
        language: Language,
    ) -> StoryverseResult<Vec<StoryMetadata>>;

    /// Request the full text of one story.
    ///
    /// # Returns
    /// * `Ok(String)` - Markdown prose, or [`FULL_STORY_FALLBACK`] when the
    ///   model returned nothing
    /// * `Err(GenerationError::ContentFailed)` - The call itself failed
    async fn generate_full_story(
        &self,
        title: &str,
        summary: &str,
        age: AgeBracket,
        language: Language,
        category: StoryCategory,
    ) -> StoryverseResult<String>;

    /// Request a cover illustration with no text in it.
    ///
    /// # Returns
    /// * `Ok(Some(ImageRef))` - The inlined picture
    /// * `Ok(None)` - The model produced no picture
    /// * `Err(GenerationError::CoverFailed)` - Transport or provider failure
    async fn generate_cover_image(
        &self,
        title: &str,
        summary: &str,
        category: StoryCategory,
    ) -> StoryverseResult<Option<ImageRef>>;

    /// Describe an image for a child. Never fails; problems degrade to
    /// [`ANALYZE_FAILURE_FALLBACK`].
    async fn analyze_image(&self, image: &ImageRef, prompt: &str) -> String;
}
