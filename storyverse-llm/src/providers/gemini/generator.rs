//! Gemini-backed story generator

use super::client::GeminiClient;
use super::types::{GenerateContentRequest, GenerationConfig, Part};
use super::PROVIDER;
use crate::parse::{assign_ids, parse_story_list};
use crate::prompts::{cover_prompt, full_story_prompt, story_list_prompt};
use crate::{
    StoryGenerator, ANALYZE_EMPTY_FALLBACK, ANALYZE_FAILURE_FALLBACK, DEFAULT_ANALYZE_PROMPT,
    FULL_STORY_FALLBACK,
};
use async_trait::async_trait;
use serde_json::json;
use storyverse_core::{
    now_millis, AgeBracket, GenerationError, ImageRef, Language, PartitionKey, ProviderConfig,
    StoryCategory, StoryMetadata, StoryverseError, StoryverseResult,
};

/// Model names used for each kind of call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiModels {
    pub text: String,
    pub image: String,
    pub vision: String,
}

impl Default for GeminiModels {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for GeminiModels {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            text: config.text_model.clone(),
            image: config.image_model.clone(),
            vision: config.vision_model.clone(),
        }
    }
}

/// Story generator over the Gemini REST API.
#[derive(Debug)]
pub struct GeminiStoryGenerator {
    client: GeminiClient,
    models: GeminiModels,
}

impl GeminiStoryGenerator {
    pub fn new(client: GeminiClient, models: GeminiModels) -> Self {
        Self { client, models }
    }

    /// Build from configuration. Requires `provider.api_key`.
    pub fn from_config(config: &ProviderConfig) -> StoryverseResult<Self> {
        Ok(Self::new(GeminiClient::from_config(config)?, GeminiModels::from(config)))
    }

    pub fn models(&self) -> &GeminiModels {
        &self.models
    }
}

/// Schema forcing the list response into `[{title, summary}]`.
fn story_list_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "summary": { "type": "STRING" }
            },
            "required": ["title", "summary"]
        }
    })
}

fn story_list_request(category: StoryCategory, age: AgeBracket, language: Language) -> GenerateContentRequest {
    GenerateContentRequest::user(vec![Part::text(story_list_prompt(category, age, language))]).with_config(
        GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(story_list_schema()),
            response_modalities: None,
        },
    )
}

fn cover_request(title: &str, summary: &str, category: StoryCategory) -> GenerateContentRequest {
    GenerateContentRequest::user(vec![Part::text(cover_prompt(title, summary, category))]).with_config(
        GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string()]),
            ..GenerationConfig::default()
        },
    )
}

/// Inline image part first, then the prompt (or the default one when blank).
fn analyze_request(image: &ImageRef, prompt: &str) -> GenerateContentRequest {
    let prompt = if prompt.trim().is_empty() {
        DEFAULT_ANALYZE_PROMPT
    } else {
        prompt
    };
    GenerateContentRequest::user(vec![
        Part::inline(image.mime_type(), image.payload()),
        Part::text(prompt),
    ])
}

/// Wrap a transport error as a generation failure, except a rejected or
/// missing credential, which callers must see as such.
fn generation_failure(
    error: StoryverseError,
    wrap: impl FnOnce(String) -> GenerationError,
) -> StoryverseError {
    if error.is_configuration() {
        error
    } else {
        wrap(error.to_string()).into()
    }
}

#[async_trait]
impl StoryGenerator for GeminiStoryGenerator {
    async fn generate_story_list(
        &self,
        category: StoryCategory,
        age: AgeBracket,
        language: Language,
    ) -> StoryverseResult<Vec<StoryMetadata>> {
        let request = story_list_request(category, age, language);
        let response = self
            .client
            .generate_content(&self.models.text, &request)
            .await
            .map_err(|e| {
                generation_failure(e, |reason| GenerationError::ListFailed { reason })
            })?;

        let raw = response.text().unwrap_or_default();
        let items = parse_story_list(&raw)?;
        let key = PartitionKey::new(category, age, language);
        tracing::debug!(partition = %key, count = items.len(), "Generated story list");
        Ok(assign_ids(items, &key, now_millis()))
    }

    async fn generate_full_story(
        &self,
        title: &str,
        summary: &str,
        age: AgeBracket,
        language: Language,
        category: StoryCategory,
    ) -> StoryverseResult<String> {
        let request = GenerateContentRequest::user(vec![Part::text(full_story_prompt(
            title, summary, age, language, category,
        ))]);

        let response = self
            .client
            .generate_content(&self.models.text, &request)
            .await
            .map_err(|e| {
                generation_failure(e, |reason| GenerationError::ContentFailed { reason })
            })?;

        Ok(response
            .text()
            .unwrap_or_else(|| FULL_STORY_FALLBACK.to_string()))
    }

    async fn generate_cover_image(
        &self,
        title: &str,
        summary: &str,
        category: StoryCategory,
    ) -> StoryverseResult<Option<ImageRef>> {
        let request = cover_request(title, summary, category);
        let response = self
            .client
            .generate_content(&self.models.image, &request)
            .await
            .map_err(|e| {
                generation_failure(e, |reason| GenerationError::CoverFailed { reason })
            })?;

        let image = response
            .inline_data()
            .map(|data| ImageRef::from_inline(&data.mime_type, &data.data));
        if image.is_none() {
            tracing::debug!(title, "Image model returned no picture");
        }
        Ok(image)
    }

    async fn analyze_image(&self, image: &ImageRef, prompt: &str) -> String {
        let request = analyze_request(image, prompt);
        match self.client.generate_content(&self.models.vision, &request).await {
            Ok(response) => response
                .text()
                .unwrap_or_else(|| ANALYZE_EMPTY_FALLBACK.to_string()),
            Err(e) => {
                tracing::warn!(provider = PROVIDER, error = %e, "Image analysis failed");
                ANALYZE_FAILURE_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use std::time::Duration;
    use storyverse_core::StoryverseError;

    fn generator(server: &MockServer) -> GeminiStoryGenerator {
        let client = GeminiClient::new("k", server.base_url(), 6000, Duration::from_secs(5)).unwrap();
        GeminiStoryGenerator::new(client, GeminiModels::default())
    }

    fn text_body(text: &str) -> String {
        serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    #[tokio::test]
    async fn test_story_list_parsed_and_ids_assigned() {
        let server = MockServer::start_async().await;
        let list = r#"```json
[{"title":"Ocean Song","summary":"A whale sings."},{"title":"Sky Boat","summary":"A boat flies."}]
```"#;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/models/gemini-2.5-flash:generateContent");
                then.status(200).body(text_body(list));
            })
            .await;

        let stories = generator(&server)
            .generate_story_list(StoryCategory::Adventure, AgeBracket::Toddler, Language::English)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title, "Ocean Song");
        assert!(stories[1].id.as_str().starts_with("Adventure & Pirates-2-4 Years-English-1-"));
    }

    #[tokio::test]
    async fn test_story_list_empty_body_is_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).body(r#"{"candidates":[]}"#);
            })
            .await;

        let err = generator(&server)
            .generate_story_list(StoryCategory::Adventure, AgeBracket::Toddler, Language::English)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoryverseError::Generation(GenerationError::ListFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_story_list_transport_failure_is_list_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(500).body("boom");
            })
            .await;

        let err = generator(&server)
            .generate_story_list(StoryCategory::Magic, AgeBracket::OlderKid, Language::French)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoryverseError::Generation(GenerationError::ListFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_story_list_rejected_key_stays_configuration_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(401).body("unauthorized");
            })
            .await;

        let err = generator(&server)
            .generate_story_list(StoryCategory::Magic, AgeBracket::OlderKid, Language::French)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_full_story_fallback_on_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).body(r#"{"candidates":[{"content":{"parts":[]}}]}"#);
            })
            .await;

        let text = generator(&server)
            .generate_full_story("T", "S", AgeBracket::EarlyGrade, Language::English, StoryCategory::School)
            .await
            .unwrap();
        assert_eq!(text, FULL_STORY_FALLBACK);
    }

    #[tokio::test]
    async fn test_cover_image_inline() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/models/gemini-2.5-flash-image:generateContent");
                then.status(200).body(
                    r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"QUJD"}}]}}]}"#,
                );
            })
            .await;

        let image = generator(&server)
            .generate_cover_image("T", "S", StoryCategory::Space)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.as_str(), "data:image/png;base64,QUJD");
    }

    #[tokio::test]
    async fn test_cover_image_absent_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).body(text_body("I cannot draw that"));
            })
            .await;

        let image = generator(&server)
            .generate_cover_image("T", "S", StoryCategory::Space)
            .await
            .unwrap();
        assert_eq!(image, None);
    }

    #[tokio::test]
    async fn test_cover_transport_failure_is_cover_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(503).body("unavailable");
            })
            .await;

        let err = generator(&server)
            .generate_cover_image("T", "S", StoryCategory::Space)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoryverseError::Generation(GenerationError::CoverFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_analyze_image_returns_description() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/models/gemini-3-pro-preview:generateContent");
                then.status(200).body(text_body("A happy dog."));
            })
            .await;

        let answer = generator(&server)
            .analyze_image(&ImageRef::from_inline("image/jpeg", "QUJD"), "What is this?")
            .await;

        mock.assert_async().await;
        assert_eq!(answer, "A happy dog.");
    }

    #[test]
    fn test_analyze_request_shape() {
        let request = analyze_request(&ImageRef::from_inline("image/jpeg", "QUJD"), "  ");
        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], DEFAULT_ANALYZE_PROMPT);
    }

    #[test]
    fn test_list_and_cover_request_config() {
        let list = serde_json::to_value(story_list_request(
            StoryCategory::Bedtime,
            AgeBracket::Toddler,
            Language::French,
        ))
        .unwrap();
        assert_eq!(list["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(list["generationConfig"]["responseSchema"]["type"], "ARRAY");

        let cover = serde_json::to_value(cover_request("T", "S", StoryCategory::Bedtime)).unwrap();
        assert_eq!(cover["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[tokio::test]
    async fn test_analyze_image_empty_answer() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(200).body(r#"{"candidates":[]}"#);
            })
            .await;

        let answer = generator(&server)
            .analyze_image(&ImageRef::new("QUJD"), "What is this?")
            .await;
        assert_eq!(answer, ANALYZE_EMPTY_FALLBACK);
    }

    #[tokio::test]
    async fn test_analyze_image_degrades() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST");
                then.status(500).body("down");
            })
            .await;

        let answer = generator(&server)
            .analyze_image(&ImageRef::new("QUJD"), "What is this?")
            .await;
        assert_eq!(answer, ANALYZE_FAILURE_FALLBACK);
    }
}
