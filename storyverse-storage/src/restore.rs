//! Startup restore: durable store, legacy migration, and fallback.

use sha2::{Digest, Sha256};
use storyverse_core::{PartitionMap, Story};

use crate::legacy::{parse_legacy_cache, LegacySlot};
use crate::store::StoryStore;

/// Marker holding the SHA-256 (hex) of the last migrated legacy blob.
pub const LEGACY_DIGEST_MARKER: &str = "legacy_cache_sha256";

/// Where the restored library came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    /// Read from the durable store (possibly after migrating legacy data).
    Durable,
    /// The durable store was empty or unusable; the parsed legacy blob was
    /// used directly.
    LegacyFallback,
    /// Nothing to restore.
    Empty,
}

/// Result of [`restore_library`].
#[derive(Debug, Clone)]
pub struct RestoredLibrary {
    pub stories: PartitionMap,
    pub source: RestoreSource,
    /// Legacy records upserted into the durable store during this restore.
    pub migrated: usize,
}

/// Load the library at startup.
///
/// Opens the store, migrates the legacy blob when it has changed since the
/// last migration, then reads everything back. If the store yields nothing
/// the parsed legacy content is returned instead, so a store fault never
/// hides data the legacy blob still holds. Never fails; problems are
/// logged. Transient loading flags are cleared on every restored story.
///
/// # Arguments
///
/// * `store` - Durable store to initialize and read
/// * `legacy` - Legacy blob location, if one is configured
pub async fn restore_library(store: &dyn StoryStore, legacy: Option<&LegacySlot>) -> RestoredLibrary {
    let store_ready = match store.init().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Story store unavailable, continuing without persistence");
            false
        }
    };

    let legacy_raw = legacy.and_then(|slot| match slot.read() {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read legacy cache");
            None
        }
    });
    let legacy_parsed = legacy_raw.as_deref().and_then(|raw| match parse_legacy_cache(raw) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparseable legacy cache");
            None
        }
    });

    let mut migrated = 0;
    if store_ready {
        if let (Some(raw), Some(map)) = (legacy_raw.as_deref(), legacy_parsed.as_ref()) {
            migrated = migrate_legacy(store, raw, map).await;
        }
    }

    let durable = if store_ready {
        match store.get_all_stories().await {
            Ok(map) => map,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stories from store");
                PartitionMap::new()
            }
        }
    } else {
        PartitionMap::new()
    };

    let (stories, source) = if !is_empty(&durable) {
        (durable, RestoreSource::Durable)
    } else if let Some(map) = legacy_parsed.filter(|m| !is_empty(m)) {
        tracing::warn!("Story store empty, falling back to legacy cache contents");
        (map, RestoreSource::LegacyFallback)
    } else {
        (PartitionMap::new(), RestoreSource::Empty)
    };

    let stories = settle(stories);
    tracing::info!(
        source = ?source,
        partitions = stories.len(),
        stories = stories.values().map(Vec::len).sum::<usize>(),
        migrated,
        "Library restored"
    );

    RestoredLibrary {
        stories,
        source,
        migrated,
    }
}

/// Upsert the legacy stories unless this exact blob was already migrated.
/// Returns the number of records written.
async fn migrate_legacy(store: &dyn StoryStore, raw: &str, map: &PartitionMap) -> usize {
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));

    match store.migration_marker(LEGACY_DIGEST_MARKER).await {
        Ok(Some(previous)) if previous == digest => {
            tracing::debug!("Legacy cache unchanged since last migration");
            return 0;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Could not read migration marker, migrating anyway");
        }
    }

    let flattened: Vec<Story> = map.values().flatten().cloned().collect();
    if flattened.is_empty() {
        return 0;
    }

    match store.save_stories(&flattened).await {
        Ok(()) => {
            if let Err(e) = store.set_migration_marker(LEGACY_DIGEST_MARKER, &digest).await {
                tracing::warn!(error = %e, "Could not record migration marker");
            }
            tracing::info!(count = flattened.len(), "Migrated legacy cache into story store");
            flattened.len()
        }
        Err(e) => {
            tracing::error!(error = %e, "Legacy migration failed");
            0
        }
    }
}

fn is_empty(map: &PartitionMap) -> bool {
    map.values().all(Vec::is_empty)
}

fn settle(map: PartitionMap) -> PartitionMap {
    map.into_iter()
        .map(|(key, list)| (key, list.into_iter().map(Story::settled).collect()))
        .collect()
}
