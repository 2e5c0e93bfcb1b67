//! Gemini provider implementation
//!
//! Text, image, and vision generation through the Gemini REST API.

pub mod client;
pub mod generator;
pub mod types;

pub use client::GeminiClient;
pub use generator::{GeminiModels, GeminiStoryGenerator};

pub(crate) const PROVIDER: &str = "gemini";
