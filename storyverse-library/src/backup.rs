//! JSON backups in the legacy single-blob shape: an object keyed by
//! `category|age|language`, each value a list of stories.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use storyverse_core::{PartitionKey, Story, StorageError, StoryverseResult};
use storyverse_storage::parse_legacy_cache;

use crate::cache::StoryLibrary;
use crate::service::durable_copy;

/// What a backup operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSummary {
    pub partitions: usize,
    pub stories: usize,
}

/// Default backup file name for a moment in time.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("storyverse_backup_{}.json", stamp)
}

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Write the whole library to `path` as pretty JSON.
///
/// Partitions are written in key order; the written copy carries no
/// loading flags and no failure placeholder text.
pub fn export_backup(library: &StoryLibrary, path: &Path) -> StoryverseResult<BackupSummary> {
    let ordered: BTreeMap<PartitionKey, Vec<Story>> = library
        .snapshot()
        .into_iter()
        .filter(|(_, stories)| !stories.is_empty())
        .map(|(key, stories)| (key, stories.into_iter().map(durable_copy).collect()))
        .collect();
    let summary = BackupSummary {
        partitions: ordered.len(),
        stories: ordered.values().map(Vec::len).sum(),
    };

    let json = serde_json::to_string_pretty(&ordered).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| io_error(path, e))?;

    tracing::info!(path = %path.display(), stories = summary.stories, "Exported backup");
    Ok(summary)
}

/// Merge a backup file into the library.
///
/// Stories are regrouped by their own fields and merged by id: existing
/// stories are replaced, new ones appended. Everything imported is
/// persisted.
pub fn import_backup(library: &StoryLibrary, path: &Path) -> StoryverseResult<BackupSummary> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let parsed = parse_legacy_cache(&raw)?;
    let partitions = parsed.len();
    let stories: Vec<Story> = parsed
        .into_values()
        .flatten()
        .map(durable_copy)
        .collect();
    let merged = library.merge_stories(stories);

    tracing::info!(path = %path.display(), stories = merged, partitions, "Imported backup");
    Ok(BackupSummary {
        partitions,
        stories: merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::CONTENT_ERROR_PLACEHOLDER;
    use chrono::TimeZone;
    use std::sync::Arc;
    use storyverse_core::{AgeBracket, Language, StoryCategory, StoryverseError};
    use storyverse_storage::InMemoryStoryStore;
    use storyverse_test_utils::fixtures::{key, make_partition, make_story_titled};

    fn school() -> PartitionKey {
        key(StoryCategory::School, AgeBracket::EarlyGrade, Language::English)
    }

    #[test]
    fn test_backup_file_name_is_path_safe() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();
        assert_eq!(
            backup_file_name(at),
            "storyverse_backup_2026-03-01T09-30-05.000Z.json"
        );
    }

    #[tokio::test]
    async fn test_export_then_import_into_fresh_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("backup.json");

        let source = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
        let mut stories = make_partition(school(), 3);
        stories[2].is_loading_cover = true;
        source.set_list(school(), stories).unwrap();

        let exported = export_backup(&source, &path).unwrap();
        assert_eq!(exported, BackupSummary { partitions: 1, stories: 3 });

        let store = Arc::new(InMemoryStoryStore::new());
        let target = StoryLibrary::empty(store.clone());
        let imported = import_backup(&target, &path).unwrap();
        assert_eq!(imported.stories, 3);

        let restored = target.get_by_key(&school());
        assert_eq!(restored.len(), 3);
        assert!(restored.iter().all(|s| !s.is_loading_cover));
        target.flush().await;
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_import_merges_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let source = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
        source
            .set_list(school(), vec![make_story_titled(school(), 0, "From backup")])
            .unwrap();
        export_backup(&source, &path).unwrap();

        let target = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
        target.set_list(school(), make_partition(school(), 2)).unwrap();
        import_backup(&target, &path).unwrap();

        let list = target.get_by_key(&school());
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "From backup");
    }

    #[tokio::test]
    async fn test_failure_placeholder_is_not_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let source = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
        let mut stories = make_partition(school(), 2);
        stories[0] = stories[0].clone().with_content("Once upon a time.".to_string());
        stories[1] = stories[1]
            .clone()
            .with_content(CONTENT_ERROR_PLACEHOLDER.to_string());
        source.set_list(school(), stories).unwrap();

        export_backup(&source, &path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains(CONTENT_ERROR_PLACEHOLDER));

        let store = Arc::new(InMemoryStoryStore::new());
        let target = StoryLibrary::empty(store.clone());
        import_backup(&target, &path).unwrap();
        let restored = target.get_by_key(&school());
        assert_eq!(restored[0].content.as_deref(), Some("Once upon a time."));
        assert!(restored[1].needs_content());
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let library = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
        let err = import_backup(&library, &path).unwrap_err();
        assert!(matches!(err, StoryverseError::Storage(StorageError::LegacyParse { .. })));
        assert_eq!(library.story_count(), 0);
    }

    #[tokio::test]
    async fn test_import_missing_file() {
        let library = StoryLibrary::empty(Arc::new(InMemoryStoryStore::new()));
        let err = import_backup(&library, Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, StoryverseError::Storage(StorageError::Io { .. })));
    }
}
