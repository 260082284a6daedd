//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use crate::core::{Error, Result};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter for the crate's targets at `level`; `RUST_LOG` wins when set.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    let level: LevelFilter = level
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("unknown log level: {}", level)))?;

    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(format!("kredai={}", level))
            .map_err(|e| Error::InvalidConfig(format!("log filter: {}", e))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.level)?);

    let installed = match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("logging already initialised: {}", e)))
}
