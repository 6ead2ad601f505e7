//! Structured logging setup
//!
//! All crates log through `tracing`; binaries call [`init_logging`] once at
//! startup. `RUST_LOG` takes precedence over the configured level.

use crate::config::{parse_env_var, ConfigLoader};
use crate::error::RecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration
///
/// # Environment Variables
///
/// - `IMPLICIT_REC_LOG_LEVEL`: default filter level (default: `info`)
/// - `IMPLICIT_REC_LOG_FORMAT`: `pretty`, `compact` or `json` (default: `compact`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl ConfigLoader for LogConfig {
    fn from_env() -> Result<Self, RecError> {
        let defaults = LogConfig::default();

        Ok(Self {
            level: parse_env_var("IMPLICIT_REC_LOG_LEVEL", defaults.level)?,
            format: parse_env_var("IMPLICIT_REC_LOG_FORMAT", defaults.format)?,
        })
    }

    fn validate(&self) -> Result<(), RecError> {
        let level = self.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(RecError::invalid_config(
                format!(
                    "log level '{}' must be one of {}",
                    self.level,
                    LOG_LEVELS.join(", ")
                ),
                "IMPLICIT_REC_LOG_LEVEL",
            ));
        }
        Ok(())
    }
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns `InvalidConfig` if the level is invalid or a subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig) -> Result<(), RecError> {
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| RecError::InvalidConfig {
        message: format!("Failed to initialize logging: {}", e),
        key: None,
    })
}
