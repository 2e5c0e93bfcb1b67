//! Story records and the keys that partition them.

use crate::{AgeBracket, Language, StoryCategory, ValidationError};
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Media type assumed when an image reference carries no prefix.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

static DATA_URI_MIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:([\w.+-]+/[\w.+-]+)[;,]").expect("data URI pattern is valid")
});

// ============================================================================
// IDENTITY
// ============================================================================

/// Story identifier. Stable once assigned; unique within its partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the identifier for the story at `position` of a freshly
    /// generated batch. Position keeps ids distinct within one batch, the
    /// timestamp keeps them distinct across batches.
    pub fn generate(key: &PartitionKey, position: usize, unix_millis: i64) -> Self {
        Self(format!(
            "{}-{}-{}-{}-{}",
            key.category, key.age, key.language, position, unix_millis
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// PARTITION KEY
// ============================================================================

/// The (category, age, language) triple that segments the story cache.
///
/// Renders as `category|age|language` using the display labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub category: StoryCategory,
    pub age: AgeBracket,
    pub language: Language,
}

impl PartitionKey {
    pub fn new(category: StoryCategory, age: AgeBracket, language: Language) -> Self {
        Self {
            category,
            age,
            language,
        }
    }

    /// All 108 cells in sweep order: category, then age, then language.
    pub fn all() -> impl Iterator<Item = PartitionKey> {
        StoryCategory::ALL
            .into_iter()
            .flat_map(PartitionKey::for_category)
    }

    /// The 9 cells of one category: age, then language.
    pub fn for_category(category: StoryCategory) -> impl Iterator<Item = PartitionKey> {
        AgeBracket::ALL.into_iter().flat_map(move |age| {
            Language::ALL
                .into_iter()
                .map(move |language| PartitionKey::new(category, age, language))
        })
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.category, self.age, self.language)
    }
}

impl FromStr for PartitionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|');
        let (Some(category), Some(age), Some(language), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ValidationError::MalformedKey { key: s.to_string() });
        };
        Ok(Self {
            category: StoryCategory::from_db_str(category)?,
            age: AgeBracket::from_db_str(age)?,
            language: Language::from_db_str(language)?,
        })
    }
}

impl Serialize for PartitionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartitionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// IMAGE REFERENCE
// ============================================================================

/// Self-contained image: a `data:<mime>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap an already-encoded reference (data URI or raw base64).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a data URI from a media type and a base64 payload.
    pub fn from_inline(mime_type: &str, base64_data: &str) -> Self {
        Self(format!("data:{};base64,{}", mime_type, base64_data))
    }

    /// Encode raw image bytes.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::from_inline(mime_type, &encoded)
    }

    /// Media type sniffed from the data URI prefix, or [`DEFAULT_IMAGE_MIME`].
    pub fn mime_type(&self) -> &str {
        DATA_URI_MIME
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(DEFAULT_IMAGE_MIME)
    }

    /// The base64 payload with any data URI prefix stripped.
    pub fn payload(&self) -> &str {
        match self.0.split_once(',') {
            Some((_, data)) if !data.is_empty() => data,
            _ => &self.0,
        }
    }

    /// Decode the payload into image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ValidationError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.payload().trim())
            .map_err(|e| ValidationError::InvalidImage {
                reason: e.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// STORY RECORDS
// ============================================================================

/// Title and summary produced by list generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMetadata {
    pub id: StoryId,
    pub title: String,
    pub summary: String,
}

/// A story within the library.
///
/// Serialized in camelCase so legacy cache blobs and backups round-trip.
/// The two loading flags are transient and are cleared on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub summary: String,
    pub category: StoryCategory,
    pub age_bracket: AgeBracket,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub is_loading_content: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<ImageRef>,
    #[serde(default)]
    pub is_loading_cover: bool,
}

impl Story {
    /// Create a story from generated metadata placed in `key`'s partition.
    pub fn from_metadata(meta: StoryMetadata, key: PartitionKey) -> Self {
        Self {
            id: meta.id,
            title: meta.title,
            summary: meta.summary,
            category: key.category,
            age_bracket: key.age,
            language: key.language,
            content: None,
            word_count: None,
            is_loading_content: false,
            cover_image: None,
            is_loading_cover: false,
        }
    }

    /// Partition key derived from the story's own fields.
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.category, self.age_bracket, self.language)
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn has_cover(&self) -> bool {
        self.cover_image.is_some()
    }

    /// No cover yet and none in flight.
    pub fn needs_cover(&self) -> bool {
        self.cover_image.is_none() && !self.is_loading_cover
    }

    /// No content yet and none in flight.
    pub fn needs_content(&self) -> bool {
        self.content.is_none() && !self.is_loading_content
    }

    /// Attach full text, deriving the word count.
    pub fn with_content(mut self, content: String) -> Self {
        self.word_count = Some(word_count(&content));
        self.content = Some(content);
        self.is_loading_content = false;
        self
    }

    /// Copy with both transient loading flags cleared.
    pub fn settled(mut self) -> Self {
        self.is_loading_content = false;
        self.is_loading_cover = false;
        self
    }
}

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Partition-keyed story lists.
pub type PartitionMap = HashMap<PartitionKey, Vec<Story>>;

/// Group stories by their own partition key, keeping input order within
/// each partition.
pub fn group_by_partition(stories: impl IntoIterator<Item = Story>) -> PartitionMap {
    let mut map: PartitionMap = HashMap::new();
    for story in stories {
        map.entry(story.partition_key()).or_default().push(story);
    }
    map
}

// ============================================================================
// SELECTION
// ============================================================================

/// The reader's current filter triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySelection {
    pub category: StoryCategory,
    pub age_bracket: AgeBracket,
    pub language: Language,
}

impl LibrarySelection {
    pub fn key(&self) -> PartitionKey {
        PartitionKey::new(self.category, self.age_bracket, self.language)
    }
}

impl Default for LibrarySelection {
    fn default() -> Self {
        Self {
            category: StoryCategory::Disney,
            age_bracket: AgeBracket::EarlyGrade,
            language: Language::English,
        }
    }
}
