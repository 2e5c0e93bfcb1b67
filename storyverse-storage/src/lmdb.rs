//! LMDB-backed story store.
//!
//! Uses the heed crate. Two named databases live in one environment:
//! `stories` maps story id to the JSON record, `meta` holds migration
//! markers. The environment is opened lazily on `init()` or first use.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use once_cell::sync::OnceCell;
use storyverse_core::{group_by_partition, PartitionMap, Story, StorageError, StoryverseResult};

use crate::store::StoryStore;

const STORIES_DB: &str = "stories";
const META_DB: &str = "meta";

struct OpenedEnv {
    env: Env,
    stories: Database<Str, Bytes>,
    meta: Database<Str, Str>,
}

/// Story store persisted in an LMDB environment directory.
pub struct LmdbStoryStore {
    path: PathBuf,
    map_size_mb: usize,
    opened: OnceCell<OpenedEnv>,
}

impl LmdbStoryStore {
    /// Create a store rooted at `path`. Nothing is opened until `init()`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory holding the LMDB files (created on open)
    /// * `map_size_mb` - Maximum size of the environment in megabytes
    pub fn new(path: impl Into<PathBuf>, map_size_mb: usize) -> Self {
        Self {
            path: path.into(),
            map_size_mb,
            opened: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn env(&self) -> Result<&OpenedEnv, StorageError> {
        self.opened
            .get_or_try_init(|| open_env(&self.path, self.map_size_mb))
    }
}

fn open_env(path: &Path, map_size_mb: usize) -> Result<OpenedEnv, StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::Unavailable {
        reason: format!("cannot create {}: {}", path.display(), e),
    })?;

    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(map_size_mb * 1024 * 1024)
            .max_dbs(2)
            .open(path)
    }
    .map_err(|e| StorageError::Unavailable {
        reason: e.to_string(),
    })?;

    let mut wtxn = env.write_txn().map_err(|e| StorageError::Unavailable {
        reason: e.to_string(),
    })?;
    let stories: Database<Str, Bytes> = env
        .create_database(&mut wtxn, Some(STORIES_DB))
        .map_err(|e| StorageError::Unavailable {
            reason: e.to_string(),
        })?;
    let meta: Database<Str, Str> = env
        .create_database(&mut wtxn, Some(META_DB))
        .map_err(|e| StorageError::Unavailable {
            reason: e.to_string(),
        })?;
    wtxn.commit().map_err(|e| StorageError::Unavailable {
        reason: e.to_string(),
    })?;

    tracing::debug!(path = %path.display(), map_size_mb, "Opened story store");
    Ok(OpenedEnv { env, stories, meta })
}

fn txn_err(e: heed::Error) -> StorageError {
    StorageError::TransactionFailed {
        reason: e.to_string(),
    }
}

fn put_batch(opened: &OpenedEnv, encoded: &[(&str, Vec<u8>)]) -> Result<(), heed::Error> {
    let mut wtxn = opened.env.write_txn()?;
    for (id, bytes) in encoded {
        opened.stories.put(&mut wtxn, id, bytes)?;
    }
    wtxn.commit()
}

/// Enlarge the environment so a batch of `batch_bytes` fits.
///
/// Only valid while no transaction is open in this process; the library's
/// single persistence writer is the only caller of `save_stories`.
fn grow_map(opened: &OpenedEnv, batch_bytes: usize) -> Result<(), StorageError> {
    let current = opened.env.info().map_size;
    let target = current
        .saturating_mul(2)
        .max(current.saturating_add(batch_bytes.saturating_mul(2)));
    unsafe { opened.env.resize(target) }.map_err(txn_err)?;
    tracing::info!(from = current, to = target, "Grew story store map");
    Ok(())
}

#[async_trait]
impl StoryStore for LmdbStoryStore {
    async fn init(&self) -> StoryverseResult<()> {
        self.env()?;
        Ok(())
    }

    async fn save_stories(&self, stories: &[Story]) -> StoryverseResult<()> {
        if stories.is_empty() {
            return Ok(());
        }
        let opened = self.env()?;

        // Serialize everything before opening the transaction so a bad
        // record cannot leave a half-written batch.
        let encoded = stories
            .iter()
            .map(|story| {
                serde_json::to_vec(story)
                    .map(|bytes| (story.id.as_str(), bytes))
                    .map_err(|e| StorageError::Serialization {
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match put_batch(opened, &encoded) {
            Err(heed::Error::Mdb(heed::MdbError::MapFull)) => {
                let batch_bytes: usize = encoded.iter().map(|(_, bytes)| bytes.len()).sum();
                grow_map(opened, batch_bytes)?;
                put_batch(opened, &encoded).map_err(txn_err)?;
            }
            other => other.map_err(txn_err)?,
        }
        Ok(())
    }

    async fn get_all_stories(&self) -> StoryverseResult<PartitionMap> {
        let opened = self.env()?;
        let rtxn = opened.env.read_txn().map_err(txn_err)?;

        let mut stories = Vec::new();
        for entry in opened.stories.iter(&rtxn).map_err(txn_err)? {
            let (id, bytes) = entry.map_err(txn_err)?;
            match serde_json::from_slice::<Story>(bytes) {
                Ok(story) => stories.push(story),
                Err(e) => {
                    tracing::warn!(story_id = id, error = %e, "Skipping unreadable story record");
                }
            }
        }
        Ok(group_by_partition(stories))
    }

    async fn clear_database(&self) -> StoryverseResult<()> {
        let opened = self.env()?;
        let mut wtxn = opened.env.write_txn().map_err(txn_err)?;
        opened.stories.clear(&mut wtxn).map_err(txn_err)?;
        opened.meta.clear(&mut wtxn).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn migration_marker(&self, name: &str) -> StoryverseResult<Option<String>> {
        let opened = self.env()?;
        let rtxn = opened.env.read_txn().map_err(txn_err)?;
        let value = opened.meta.get(&rtxn, name).map_err(txn_err)?;
        Ok(value.map(str::to_string))
    }

    async fn set_migration_marker(&self, name: &str, value: &str) -> StoryverseResult<()> {
        let opened = self.env()?;
        let mut wtxn = opened.env.write_txn().map_err(txn_err)?;
        opened.meta.put(&mut wtxn, name, value).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }
}
