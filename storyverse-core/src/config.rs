//! Configuration loading.
//!
//! Defaults, then an optional TOML file, then environment overrides.
//! `validate()` runs last.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "STORYVERSE_CONFIG";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_LOG_FILTER: &str = "storyverse=info,warn";

// ============================================================================
// SECTIONS
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct StoryverseConfig {
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub pacing: SweepPacing,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// LMDB environment directory.
    pub data_dir: PathBuf,
    pub map_size_mb: usize,
    /// Old single-blob cache file, read once at startup.
    pub legacy_cache_path: PathBuf,
    pub selection_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_base_dir();
        Self {
            data_dir: base.join("db"),
            map_size_mb: 1024,
            legacy_cache_path: base.join("storyverse_cache.json"),
            selection_path: base.join("selection.json"),
        }
    }
}

/// Generative provider settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub vision_model: String,
    pub requests_per_minute: u32,
    pub request_timeout_ms: u64,
}

impl ProviderConfig {
    /// The API key, or `MissingRequired` when none is configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingRequired {
                field: "provider.api_key".to_string(),
            }),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            vision_model: "gemini-3-pro-preview".to_string(),
            requests_per_minute: 30,
            request_timeout_ms: 120_000,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("vision_model", &self.vision_model)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Delays between provider calls during sweeps, and the error budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SweepPacing {
    /// After a skipped (already populated) cell.
    pub skip_delay_ms: u64,
    pub category_delay_ms: u64,
    pub universe_delay_ms: u64,
    pub paint_delay_ms: u64,
    /// Between covers when painting a single partition.
    pub partition_paint_delay_ms: u64,
    /// How long an aborted sweep keeps its error progress visible.
    pub error_cooldown_ms: u64,
    /// The universe sweep aborts once consecutive failures exceed this.
    pub max_consecutive_errors: u32,
}

impl SweepPacing {
    /// No delays at all. For tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            skip_delay_ms: 0,
            category_delay_ms: 0,
            universe_delay_ms: 0,
            paint_delay_ms: 0,
            partition_paint_delay_ms: 0,
            error_cooldown_ms: 0,
            ..Self::default()
        }
    }

    pub fn skip_delay(&self) -> Duration {
        Duration::from_millis(self.skip_delay_ms)
    }

    pub fn category_delay(&self) -> Duration {
        Duration::from_millis(self.category_delay_ms)
    }

    pub fn universe_delay(&self) -> Duration {
        Duration::from_millis(self.universe_delay_ms)
    }

    pub fn paint_delay(&self) -> Duration {
        Duration::from_millis(self.paint_delay_ms)
    }

    pub fn partition_paint_delay(&self) -> Duration {
        Duration::from_millis(self.partition_paint_delay_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }
}

impl Default for SweepPacing {
    fn default() -> Self {
        Self {
            skip_delay_ms: 100,
            category_delay_ms: 1500,
            universe_delay_ms: 2000,
            paint_delay_ms: 2000,
            partition_paint_delay_ms: 1000,
            error_cooldown_ms: 5000,
            max_consecutive_errors: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

impl StoryverseConfig {
    /// Load configuration.
    ///
    /// # Arguments
    /// * `path` - Explicit config file; falls back to `STORYVERSE_CONFIG`.
    ///   With neither, defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(config_path_from_env);
        let mut config = match path {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: StoryverseConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.storage.data_dir = expand_home(&config.storage.data_dir);
        config.storage.legacy_cache_path = expand_home(&config.storage.legacy_cache_path);
        config.storage.selection_path = expand_home(&config.storage.selection_path);
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// `GEMINI_API_KEY` wins over `API_KEY`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(dir) = non_empty("STORYVERSE_DATA_DIR") {
            self.storage.data_dir = expand_home(Path::new(&dir));
        }
        if let Some(filter) = non_empty("STORYVERSE_LOG") {
            self.logging.filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("provider.base_url", &self.provider.base_url),
            ("provider.text_model", &self.provider.text_model),
            ("provider.image_model", &self.provider.image_model),
            ("provider.vision_model", &self.provider.vision_model),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(invalid(field, value, "must not be empty"));
            }
        }
        if self.provider.requests_per_minute == 0 {
            return Err(invalid("provider.requests_per_minute", "0", "must be > 0"));
        }
        if self.provider.request_timeout_ms == 0 {
            return Err(invalid("provider.request_timeout_ms", "0", "must be > 0"));
        }
        if self.storage.map_size_mb == 0 {
            return Err(invalid("storage.map_size_mb", "0", "must be > 0"));
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(invalid("storage.data_dir", "", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

fn default_base_dir() -> PathBuf {
    home_dir()
        .map(|home| home.join(".storyverse"))
        .unwrap_or_else(|| PathBuf::from(".storyverse"))
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
