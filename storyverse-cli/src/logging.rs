//! Tracing subscriber setup.

use storyverse_core::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LoggingConfig) -> CliResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| CliError::Logging(format!("invalid filter {:?}: {}", config.filter, e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| CliError::Logging(e.to_string()))
}
