//! Wiring from configuration to library, generator, and orchestrator.

use std::sync::Arc;

use storyverse_bulk::BulkOrchestrator;
use storyverse_core::{LibrarySelection, Story, StoryId, StoryverseConfig};
use storyverse_library::{StoryLibrary, StoryService};
use storyverse_llm::{GeminiStoryGenerator, StoryGenerator};
use storyverse_storage::{LegacySlot, LmdbStoryStore};

use crate::error::{CliError, CliResult};
use crate::selection;

pub struct App {
    pub config: StoryverseConfig,
    pub library: Arc<StoryLibrary>,
    pub selection: LibrarySelection,
}

impl App {
    /// Open the durable store, restore the library, and load the saved
    /// selection.
    pub async fn open(config: StoryverseConfig) -> Self {
        let store = Arc::new(LmdbStoryStore::new(
            &config.storage.data_dir,
            config.storage.map_size_mb,
        ));
        let legacy = LegacySlot::new(&config.storage.legacy_cache_path);
        let (library, _) = StoryLibrary::open(store, Some(legacy)).await;

        let selection = selection::load_or_default(&config.storage.selection_path);
        Self {
            config,
            library: Arc::new(library),
            selection,
        }
    }

    /// The generator. Fails without an API key.
    pub fn generator(&self) -> CliResult<Arc<dyn StoryGenerator>> {
        let generator = GeminiStoryGenerator::from_config(&self.config.provider)?;
        Ok(Arc::new(generator))
    }

    pub fn service(&self) -> CliResult<StoryService> {
        Ok(StoryService::new(
            self.library.clone(),
            self.generator()?,
            self.config.pacing.clone(),
        ))
    }

    pub fn bulk(&self) -> CliResult<BulkOrchestrator> {
        Ok(BulkOrchestrator::new(
            self.library.clone(),
            self.generator()?,
            self.config.pacing.clone(),
        ))
    }

    pub fn save_selection(&self) -> CliResult<()> {
        selection::save(&self.config.storage.selection_path, &self.selection)?;
        Ok(())
    }

    /// Look a story up in the selected partition first, then anywhere.
    pub fn find_story(&self, id: &str) -> CliResult<Story> {
        let id = StoryId::from(id);
        self.library
            .find(&self.selection.key(), &id)
            .or_else(|| self.library.locate(&id))
            .ok_or_else(|| CliError::StoryNotFound { id: id.to_string() })
    }

    /// Wait for queued durable writes before exiting.
    pub async fn shutdown(&self) {
        self.library.flush().await;
    }
}
