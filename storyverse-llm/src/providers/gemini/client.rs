//! Gemini HTTP client with rate limiting

use super::types::{ApiError, GenerateContentRequest, GenerateContentResponse};
use super::PROVIDER;
use crate::providers::{invalid_response, rate_limited, request_failed};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use storyverse_core::{LlmError, ProviderConfig, StoryverseError, StoryverseResult};
use tokio::sync::Semaphore;

/// Gemini API client with rate limiting.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    start_time: Instant,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    /// * `base_url` - API root, e.g. `https://generativelanguage.googleapis.com/v1beta`
    /// * `requests_per_minute` - Request budget used to space calls
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        requests_per_minute: u32,
        timeout: Duration,
    ) -> StoryverseResult<Self> {
        let rpm = requests_per_minute.max(1);
        let min_interval_ms = (60_000 / rpm as u64).max(10);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| request_failed(PROVIDER, 0, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(Semaphore::new(rpm as usize)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: min_interval_ms,
            start_time: Instant::now(),
        })
    }

    /// Build a client from provider configuration. Fails with
    /// `ConfigError::MissingRequired` when no API key is set.
    pub fn from_config(config: &ProviderConfig) -> StoryverseResult<Self> {
        let api_key = config.require_api_key()?;
        Self::new(
            api_key,
            config.base_url.clone(),
            config.requests_per_minute,
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call `models/{model}:generateContent` with automatic rate limiting.
    pub async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> StoryverseResult<GenerateContentResponse> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("Rate limiter error: {}", e)))?;

        // Enforce minimum interval between requests
        let now_ms = self.start_time.elapsed().as_millis() as u64;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        let elapsed = now_ms.saturating_sub(last_ms);

        if last_ms > 0 && elapsed < self.min_request_interval_ms {
            let wait_ms = self.min_request_interval_ms - elapsed;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        self.last_request
            .store(self.start_time.elapsed().as_millis().max(1) as u64, Ordering::Relaxed);

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        tracing::debug!(model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))
        } else {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

            let error_msg = match serde_json::from_str::<ApiError>(&error_text) {
                Ok(api_error) => api_error.error.message,
                Err(_) => error_text,
            };

            tracing::warn!(model, status = status.as_u16(), error = %error_msg, "Gemini request failed");
            Err(match status {
                StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, retry_after_ms),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    StoryverseError::Llm(LlmError::ProviderNotConfigured)
                }
                _ => request_failed(PROVIDER, status.as_u16() as i32, error_msg),
            })
        }
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
