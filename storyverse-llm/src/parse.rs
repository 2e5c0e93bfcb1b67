//! Parsing of model responses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use storyverse_core::{GenerationError, PartitionKey, StoryId, StoryMetadata};

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```(?:json)?\s*").expect("leading fence pattern is valid"));
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*```\s*$").expect("trailing fence pattern is valid"));

/// One entry of a generated story list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoryListItem {
    pub title: String,
    pub summary: String,
}

/// Strip a Markdown code fence wrapped around a payload.
pub fn strip_code_fence(raw: &str) -> &str {
    let start = LEADING_FENCE.find(raw).map(|m| m.end()).unwrap_or(0);
    let rest = &raw[start..];
    let end = TRAILING_FENCE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    rest[..end].trim()
}

/// Parse a story list response.
///
/// Empty text, invalid JSON, and an empty array are all failures.
pub fn parse_story_list(raw: &str) -> Result<Vec<StoryListItem>, GenerationError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(GenerationError::ListFailed {
            reason: "empty response".to_string(),
        });
    }
    let items: Vec<StoryListItem> =
        serde_json::from_str(body).map_err(|e| GenerationError::ListFailed {
            reason: format!("unparseable story list: {}", e),
        })?;
    if items.is_empty() {
        return Err(GenerationError::ListFailed {
            reason: "story list is empty".to_string(),
        });
    }
    Ok(items)
}

/// Give each item an id unique within the batch.
pub fn assign_ids(items: Vec<StoryListItem>, key: &PartitionKey, unix_millis: i64) -> Vec<StoryMetadata> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| StoryMetadata {
            id: StoryId::generate(key, position, unix_millis),
            title: item.title,
            summary: item.summary,
        })
        .collect()
}
