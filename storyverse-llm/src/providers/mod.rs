//! Generative provider implementations.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiModels, GeminiStoryGenerator};

use storyverse_core::{LlmError, StoryverseError};

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> StoryverseError {
    StoryverseError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> StoryverseError {
    StoryverseError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> StoryverseError {
    StoryverseError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
