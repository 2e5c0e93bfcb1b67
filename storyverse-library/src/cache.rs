//! The story cache.
//!
//! [`StoryLibrary`] owns the authoritative partition map. Every mutation
//! replaces the affected partition under one write lock, bumps a revision
//! counter that subscribers can watch, and queues a durable write. Durable
//! writes run on a single background task in submission order; their
//! failures are logged and counted, never returned to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use storyverse_core::{
    group_by_partition, AgeBracket, Language, PartitionKey, PartitionMap, Story, StoryCategory,
    StoryId, StoryverseResult, ValidationError,
};
use storyverse_storage::{restore_library, LegacySlot, RestoredLibrary, StoryStore};
use tokio::sync::{mpsc, oneshot, watch};

// ============================================================================
// PERSISTENCE WRITER
// ============================================================================

enum WriteCommand {
    Save(Vec<Story>),
    Clear(oneshot::Sender<StoryverseResult<()>>),
    Flush(oneshot::Sender<()>),
}

/// Counters for the background writer.
#[derive(Debug, Default)]
pub struct PersistenceMetrics {
    /// Save batches that reached the store
    pub batches_saved: AtomicU64,
    /// Stories contained in those batches
    pub stories_saved: AtomicU64,
    /// Save batches the store rejected
    pub save_failures: AtomicU64,
}

impl PersistenceMetrics {
    pub fn snapshot(&self) -> PersistenceSnapshot {
        PersistenceSnapshot {
            batches_saved: self.batches_saved.load(Ordering::Relaxed),
            stories_saved: self.stories_saved.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceSnapshot {
    pub batches_saved: u64,
    pub stories_saved: u64,
    pub save_failures: u64,
}

/// Drain write commands until every sender is gone.
async fn persistence_writer(
    store: Arc<dyn StoryStore>,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
    metrics: Arc<PersistenceMetrics>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriteCommand::Save(stories) => match store.save_stories(&stories).await {
                Ok(()) => {
                    metrics.batches_saved.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .stories_saved
                        .fetch_add(stories.len() as u64, Ordering::Relaxed);
                }
                Err(e) => {
                    metrics.save_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(error = %e, count = stories.len(), "Failed to persist stories");
                }
            },
            WriteCommand::Clear(reply) => {
                let result = store.clear_database().await;
                if let Err(e) = &result {
                    tracing::error!(error = %e, "Failed to clear story store");
                }
                let _ = reply.send(result);
            }
            WriteCommand::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }
    tracing::debug!("Persistence writer stopped");
}

// ============================================================================
// STORY LIBRARY
// ============================================================================

/// Authoritative in-memory story cache mirrored to a durable store.
///
/// Must be created inside a tokio runtime; construction spawns the
/// background writer.
pub struct StoryLibrary {
    partitions: RwLock<PartitionMap>,
    store: Arc<dyn StoryStore>,
    legacy: Option<LegacySlot>,
    writes: mpsc::UnboundedSender<WriteCommand>,
    revision: watch::Sender<u64>,
    metrics: Arc<PersistenceMetrics>,
}

impl StoryLibrary {
    /// Restore from `store` (migrating `legacy` when present) and start
    /// the writer.
    ///
    /// # Returns
    /// The library and a description of where its contents came from.
    pub async fn open(
        store: Arc<dyn StoryStore>,
        legacy: Option<LegacySlot>,
    ) -> (Self, RestoredLibrary) {
        let restored = restore_library(store.as_ref(), legacy.as_ref()).await;
        let library = Self::with_contents(store, legacy, restored.stories.clone());
        (library, restored)
    }

    /// Start from known contents without touching the store.
    pub fn with_contents(
        store: Arc<dyn StoryStore>,
        legacy: Option<LegacySlot>,
        contents: PartitionMap,
    ) -> Self {
        let (writes, commands) = mpsc::unbounded_channel();
        let metrics = Arc::new(PersistenceMetrics::default());
        tokio::spawn(persistence_writer(store.clone(), commands, metrics.clone()));
        let (revision, _) = watch::channel(0);

        Self {
            partitions: RwLock::new(contents),
            store,
            legacy,
            writes,
            revision,
            metrics,
        }
    }

    /// An empty library over `store`.
    pub fn empty(store: Arc<dyn StoryStore>) -> Self {
        Self::with_contents(store, None, PartitionMap::new())
    }

    fn read(&self) -> RwLockReadGuard<'_, PartitionMap> {
        self.partitions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PartitionMap> {
        self.partitions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    fn persist(&self, stories: Vec<Story>) {
        if stories.is_empty() {
            return;
        }
        if self.writes.send(WriteCommand::Save(stories)).is_err() {
            tracing::error!("Persistence writer is gone, durable write dropped");
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Stories of one partition, empty when none.
    pub fn get(&self, category: StoryCategory, age: AgeBracket, language: Language) -> Vec<Story> {
        self.get_by_key(&PartitionKey::new(category, age, language))
    }

    pub fn get_by_key(&self, key: &PartitionKey) -> Vec<Story> {
        self.read().get(key).cloned().unwrap_or_default()
    }

    pub fn has_stories(&self, key: &PartitionKey) -> bool {
        self.read().get(key).is_some_and(|list| !list.is_empty())
    }

    pub fn find(&self, key: &PartitionKey, id: &StoryId) -> Option<Story> {
        self.read()
            .get(key)
            .and_then(|list| list.iter().find(|s| &s.id == id).cloned())
    }

    /// Find a story by id in any partition.
    pub fn locate(&self, id: &StoryId) -> Option<Story> {
        self.read()
            .values()
            .flatten()
            .find(|s| &s.id == id)
            .cloned()
    }

    pub fn snapshot(&self) -> PartitionMap {
        self.read().clone()
    }

    /// Keys of non-empty partitions, sorted.
    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<_> = self
            .read()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    pub fn story_count(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    /// Revision counter, bumped on every in-memory change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn persistence_stats(&self) -> PersistenceSnapshot {
        self.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Replace a whole partition and queue a durable save of its stories.
    ///
    /// Every story must belong to `key` by its own fields.
    pub fn set_list(&self, key: PartitionKey, stories: Vec<Story>) -> Result<(), ValidationError> {
        if let Some(stray) = stories.iter().find(|s| s.partition_key() != key) {
            return Err(ValidationError::PartitionMismatch {
                story_id: stray.id.to_string(),
                expected: key.to_string(),
                found: stray.partition_key().to_string(),
            });
        }

        self.write().insert(key, stories.clone());
        self.bump();
        self.persist(stories);
        Ok(())
    }

    /// Replace one story in place, within the partition derived from its
    /// own fields, and queue a durable save.
    ///
    /// # Returns
    /// `false` when no story with that id exists there; nothing changes
    /// and nothing is persisted.
    pub fn update_one(&self, story: Story) -> bool {
        let key = story.partition_key();
        let replaced = {
            let mut partitions = self.write();
            match partitions
                .get_mut(&key)
                .and_then(|list| list.iter_mut().find(|s| s.id == story.id))
            {
                Some(slot) => {
                    *slot = story.clone();
                    true
                }
                None => false,
            }
        };

        if replaced {
            self.bump();
            self.persist(vec![story]);
        } else {
            tracing::debug!(story_id = %story.id, partition = %key, "Update for unknown story ignored");
        }
        replaced
    }

    /// Edit a story in place and persist the result.
    ///
    /// The edit sees the current state, so concurrent edits of different
    /// fields do not overwrite each other.
    pub fn update_with<F>(&self, key: &PartitionKey, id: &StoryId, edit: F) -> Option<Story>
    where
        F: FnOnce(&mut Story),
    {
        let updated = self.edit_in_place(key, id, edit)?;
        self.persist(vec![updated.clone()]);
        Some(updated)
    }

    /// Edit a story in memory only, for transient state such as loading
    /// flags.
    pub fn mark_transient<F>(&self, key: &PartitionKey, id: &StoryId, edit: F) -> Option<Story>
    where
        F: FnOnce(&mut Story),
    {
        self.edit_in_place(key, id, edit)
    }

    fn edit_in_place<F>(&self, key: &PartitionKey, id: &StoryId, edit: F) -> Option<Story>
    where
        F: FnOnce(&mut Story),
    {
        let updated = {
            let mut partitions = self.write();
            let story = partitions
                .get_mut(key)
                .and_then(|list| list.iter_mut().find(|s| &s.id == id))?;
            edit(story);
            story.clone()
        };
        self.bump();
        Some(updated)
    }

    /// Merge stories into their own partitions by id: existing ids are
    /// replaced in place, new ones appended. Everything merged is persisted.
    ///
    /// # Returns
    /// The number of stories merged.
    pub fn merge_stories(&self, stories: Vec<Story>) -> usize {
        let count = stories.len();
        if count == 0 {
            return 0;
        }
        let grouped: HashMap<PartitionKey, Vec<Story>> = group_by_partition(stories.iter().cloned());
        {
            let mut partitions = self.write();
            for (key, incoming) in grouped {
                let list = partitions.entry(key).or_default();
                for story in incoming {
                    match list.iter_mut().find(|s| s.id == story.id) {
                        Some(existing) => *existing = story,
                        None => list.push(story),
                    }
                }
            }
        }
        self.bump();
        self.persist(stories);
        count
    }

    /// Empty the cache, the durable store, and the legacy blob.
    ///
    /// The in-memory cache is cleared immediately. The store clear runs
    /// after every write queued before it. Idempotent.
    pub async fn clear_all(&self) -> StoryverseResult<()> {
        self.write().clear();
        self.bump();

        if let Some(legacy) = &self.legacy {
            if let Err(e) = legacy.remove() {
                tracing::warn!(error = %e, path = %legacy.path().display(), "Could not remove legacy cache");
            }
        }

        let (reply, done) = oneshot::channel();
        if self.writes.send(WriteCommand::Clear(reply)).is_err() {
            // Writer gone; clear directly.
            return self.store.clear_database().await;
        }
        match done.await {
            Ok(result) => result,
            Err(_) => self.store.clear_database().await,
        }
    }

    /// Wait until every durable write queued so far has been applied.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.writes.send(WriteCommand::Flush(reply)).is_ok() {
            let _ = done.await;
        }
    }
}

impl std::fmt::Debug for StoryLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryLibrary")
            .field("partitions", &self.read().len())
            .field("stories", &self.story_count())
            .field("legacy", &self.legacy)
            .finish()
    }
}
