//! Error types for the CLI.

use storyverse_core::{ConfigError, StoryverseError};

use crate::selection::SelectionError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storyverse(#[from] StoryverseError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("No story with id {id}")]
    StoryNotFound { id: String },
    #[error("Story {id} has no cover")]
    NoCover { id: String },
    #[error("Failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type CliResult<T> = Result<T, CliError>;
