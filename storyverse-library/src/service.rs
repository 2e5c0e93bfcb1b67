//! Single-story actions: list generation for one selection, lazy reading,
//! covers for one story or one partition, and image analysis.

use std::sync::Arc;

use storyverse_core::{
    ImageRef, PartitionKey, Story, StoryId, StoryverseResult, SweepPacing,
};
use storyverse_llm::{StoryGenerator, DEFAULT_ANALYZE_PROMPT};

use crate::cache::StoryLibrary;

/// Content stored when full-story generation fails. Kept in memory only so
/// the next session tries again.
pub const CONTENT_ERROR_PLACEHOLDER: &str = "Error generating story content.";

/// Whether the story holds generated text rather than the failure placeholder.
pub fn has_generated_content(story: &Story) -> bool {
    story
        .content
        .as_deref()
        .is_some_and(|text| text != CONTENT_ERROR_PLACEHOLDER)
}

/// Copy of the story fit for writing out: loading flags cleared and the
/// failure placeholder dropped.
pub fn durable_copy(story: Story) -> Story {
    let mut story = story.settled();
    if story.content.is_some() && !has_generated_content(&story) {
        story.content = None;
        story.word_count = None;
    }
    story
}

// ============================================================================
// SHARED GENERATION STEPS
// ============================================================================

/// Generate a fresh list for `key` and replace that partition with it.
///
/// Dropping the returned future before it resolves leaves the partition
/// untouched.
pub async fn generate_list(
    library: &StoryLibrary,
    generator: &dyn StoryGenerator,
    key: PartitionKey,
) -> StoryverseResult<Vec<Story>> {
    let metadata = generator
        .generate_story_list(key.category, key.age, key.language)
        .await?;
    let stories: Vec<Story> = metadata
        .into_iter()
        .map(|meta| Story::from_metadata(meta, key))
        .collect();
    library.set_list(key, stories.clone())?;
    tracing::info!(partition = %key, count = stories.len(), "Generated story list");
    Ok(stories)
}

/// Result of one cover request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaintOutcome {
    Painted,
    /// The provider answered without a picture.
    NoImage,
    Failed { reason: String },
    /// The story vanished before its cover arrived.
    Missing,
}

/// Mark a story's cover as in flight (memory only).
///
/// # Returns
/// The story as it was before marking, or `None` if it no longer exists.
pub fn begin_cover(library: &StoryLibrary, key: &PartitionKey, id: &StoryId) -> Option<Story> {
    let before = library.find(key, id)?;
    library.mark_transient(key, id, |s| s.is_loading_cover = true)?;
    Some(before)
}

/// Store the outcome of a cover request and clear the loading flag.
///
/// On failure the cover held before the request (`previous`) is put back.
pub fn finish_cover(
    library: &StoryLibrary,
    key: &PartitionKey,
    id: &StoryId,
    previous: Option<ImageRef>,
    result: StoryverseResult<Option<ImageRef>>,
) -> PaintOutcome {
    let (outcome, cover) = match result {
        Ok(Some(image)) => (PaintOutcome::Painted, Some(image)),
        Ok(None) => (PaintOutcome::NoImage, None),
        Err(e) => {
            tracing::warn!(story_id = %id, error = %e, "Cover generation failed");
            (PaintOutcome::Failed { reason: e.to_string() }, previous)
        }
    };

    let stored = library.update_with(key, id, |s| {
        s.cover_image = cover;
        s.is_loading_cover = false;
    });
    match stored {
        Some(_) => outcome,
        None => PaintOutcome::Missing,
    }
}

/// Request and store a cover for one story.
pub async fn paint_cover(
    library: &StoryLibrary,
    generator: &dyn StoryGenerator,
    key: &PartitionKey,
    id: &StoryId,
) -> PaintOutcome {
    let Some(story) = begin_cover(library, key, id) else {
        return PaintOutcome::Missing;
    };
    let result = generator
        .generate_cover_image(&story.title, &story.summary, story.category)
        .await;
    finish_cover(library, key, id, None, result)
}

// ============================================================================
// STORY SERVICE
// ============================================================================

/// Tally of a partition paint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaintSummary {
    pub requested: usize,
    pub painted: usize,
    pub no_image: usize,
    pub failed: usize,
}

impl PaintSummary {
    fn record(&mut self, outcome: &PaintOutcome) {
        match outcome {
            PaintOutcome::Painted => self.painted += 1,
            PaintOutcome::NoImage => self.no_image += 1,
            PaintOutcome::Failed { .. } => self.failed += 1,
            PaintOutcome::Missing => {}
        }
    }
}

/// Interactive actions on the library.
#[derive(Clone)]
pub struct StoryService {
    library: Arc<StoryLibrary>,
    generator: Arc<dyn StoryGenerator>,
    pacing: SweepPacing,
}

impl StoryService {
    pub fn new(
        library: Arc<StoryLibrary>,
        generator: Arc<dyn StoryGenerator>,
        pacing: SweepPacing,
    ) -> Self {
        Self {
            library,
            generator,
            pacing,
        }
    }

    pub fn library(&self) -> &Arc<StoryLibrary> {
        &self.library
    }

    /// Generate a list for the current selection, replacing whatever the
    /// partition held. Failures propagate to the caller.
    pub async fn generate_partition(&self, key: PartitionKey) -> StoryverseResult<Vec<Story>> {
        generate_list(&self.library, self.generator.as_ref(), key).await
    }

    /// Open a story for reading, generating its full text on first open.
    ///
    /// # Returns
    /// The story as stored after the call, or `None` if it does not exist.
    pub async fn open_story(&self, key: &PartitionKey, id: &StoryId) -> Option<Story> {
        let story = self.library.find(key, id)?;
        if !story.needs_content() {
            return Some(story);
        }

        self.library
            .mark_transient(key, id, |s| s.is_loading_content = true)?;

        let result = self
            .generator
            .generate_full_story(
                &story.title,
                &story.summary,
                story.age_bracket,
                story.language,
                story.category,
            )
            .await;

        match result {
            Ok(text) => self.library.update_with(key, id, |s| {
                *s = s.clone().with_content(text);
            }),
            Err(e) => {
                tracing::warn!(story_id = %id, error = %e, "Full story generation failed");
                self.library.mark_transient(key, id, |s| {
                    s.content = Some(CONTENT_ERROR_PLACEHOLDER.to_string());
                    s.is_loading_content = false;
                })
            }
        }
    }

    /// Replace a story's cover. A failed request restores the old cover.
    pub async fn regenerate_cover(&self, key: &PartitionKey, id: &StoryId) -> Option<Story> {
        let before = self.library.find(key, id)?;
        self.library.mark_transient(key, id, |s| {
            s.cover_image = None;
            s.is_loading_cover = true;
        })?;

        let result = self
            .generator
            .generate_cover_image(&before.title, &before.summary, before.category)
            .await;
        finish_cover(&self.library, key, id, before.cover_image, result);
        self.library.find(key, id)
    }

    /// Paint every story of one partition that has no cover yet.
    ///
    /// All candidates are marked loading first, then painted one at a time.
    pub async fn paint_partition(&self, key: &PartitionKey) -> PaintSummary {
        let worklist: Vec<Story> = self
            .library
            .get_by_key(key)
            .into_iter()
            .filter(Story::needs_cover)
            .collect();
        let mut summary = PaintSummary {
            requested: worklist.len(),
            ..PaintSummary::default()
        };

        for story in &worklist {
            self.library
                .mark_transient(key, &story.id, |s| s.is_loading_cover = true);
        }

        for (index, story) in worklist.iter().enumerate() {
            let outcome =
                paint_cover(&self.library, self.generator.as_ref(), key, &story.id).await;
            summary.record(&outcome);

            if index + 1 < worklist.len() {
                tokio::time::sleep(self.pacing.partition_paint_delay()).await;
            }
        }

        tracing::info!(
            partition = %key,
            requested = summary.requested,
            painted = summary.painted,
            failed = summary.failed,
            "Partition paint finished"
        );
        summary
    }

    /// Describe an image for a child; a blank prompt uses the default one.
    pub async fn analyze_image(&self, image: &ImageRef, prompt: &str) -> String {
        let prompt = if prompt.trim().is_empty() {
            DEFAULT_ANALYZE_PROMPT
        } else {
            prompt
        };
        self.generator.analyze_image(image, prompt).await
    }
}

impl std::fmt::Debug for StoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryService")
            .field("library", &self.library)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}
