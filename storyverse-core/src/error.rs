//! Error types for Storyverse operations

use thiserror::Error;

/// Durable store and legacy slot errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Story store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Legacy cache could not be parsed: {reason}")]
    LegacyParse { reason: String },

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Generative provider errors (transport and protocol level).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No generative provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Failures of the generation operations themselves.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Story list generation failed: {reason}")]
    ListFailed { reason: String },

    #[error("Cover generation failed: {reason}")]
    CoverFailed { reason: String },

    #[error("Story content generation failed: {reason}")]
    ContentFailed { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Story {story_id} belongs to partition {found}, not {expected}")]
    PartitionMismatch {
        story_id: String,
        expected: String,
        found: String,
    },

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Malformed partition key: {key}")]
    MalformedKey { key: String },

    #[error("Invalid image reference: {reason}")]
    InvalidImage { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Bulk sweep errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BulkError {
    #[error("A bulk sweep is already in progress")]
    SweepInProgress,
}

/// Master error type for all Storyverse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoryverseError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bulk error: {0}")]
    Bulk(#[from] BulkError),
}

impl StoryverseError {
    /// Whether this error means the provider can never succeed without a
    /// configuration change (missing credential).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StoryverseError::Config(_) | StoryverseError::Llm(LlmError::ProviderNotConfigured)
        )
    }
}

/// Result type alias for Storyverse operations.
pub type StoryverseResult<T> = Result<T, StoryverseError>;

// =============================================================================
// TESTS
// =============================================================================
