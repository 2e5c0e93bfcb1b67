//! The legacy single-blob cache file.
//!
//! Older installs kept the whole partition-keyed cache as one JSON object
//! (`{"category|age|language": [story, ...]}`). It is read at startup for
//! migration and removed when the library is cleared. It is never written.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use storyverse_core::{group_by_partition, PartitionMap, Story, StorageError};

/// Location of the legacy cache blob.
#[derive(Debug, Clone)]
pub struct LegacySlot {
    path: PathBuf,
}

impl LegacySlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw blob contents, or `None` when the slot is empty.
    pub fn read(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Delete the blob. Removing an absent blob is not an error.
    pub fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Parse a legacy blob.
///
/// Stored keys are ignored: every story is regrouped under the key derived
/// from its own fields, so a mislabeled legacy partition cannot leak into
/// the wrong cell.
pub fn parse_legacy_cache(raw: &str) -> Result<PartitionMap, StorageError> {
    let parsed: HashMap<String, Vec<Story>> =
        serde_json::from_str(raw).map_err(|e| StorageError::LegacyParse {
            reason: e.to_string(),
        })?;
    Ok(group_by_partition(parsed.into_values().flatten()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyverse_core::{AgeBracket, Language, PartitionKey, StoryCategory};
    use tempfile::TempDir;

    const BLOB: &str = r#"{
        "Sports & Games|2-4 Years|English": [
            {"id": "s1", "title": "Ball", "summary": "A ball.", "category": "Sports & Games",
             "ageBracket": "2-4 Years", "language": "English", "isLoadingContent": false},
            {"id": "s2", "title": "Kite", "summary": "A kite.", "category": "Sports & Games",
             "ageBracket": "7+ Years", "language": "English", "isLoadingContent": false}
        ]
    }"#;

    #[test]
    fn test_parse_regroups_by_own_fields() {
        let map = parse_legacy_cache(BLOB).unwrap();
        let toddler = PartitionKey::new(StoryCategory::Sports, AgeBracket::Toddler, Language::English);
        let older = PartitionKey::new(StoryCategory::Sports, AgeBracket::OlderKid, Language::English);
        assert_eq!(map[&toddler].len(), 1);
        assert_eq!(map[&older][0].id.as_str(), "s2");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_legacy_cache("not json"),
            Err(StorageError::LegacyParse { .. })
        ));
    }

    #[test]
    fn test_read_missing_and_remove_missing() {
        let dir = TempDir::new().unwrap();
        let slot = LegacySlot::new(dir.path().join("cache.json"));
        assert_eq!(slot.read().unwrap(), None);
        assert!(slot.remove().is_ok());
    }

    #[test]
    fn test_read_then_remove() {
        let dir = TempDir::new().unwrap();
        let slot = LegacySlot::new(dir.path().join("cache.json"));
        std::fs::write(slot.path(), BLOB).unwrap();
        assert!(slot.read().unwrap().is_some());
        slot.remove().unwrap();
        assert_eq!(slot.read().unwrap(), None);
    }
}
