//! Shared configuration loader for implicit-rec components
//!
//! Every configuration struct loads from `IMPLICIT_REC_`-prefixed environment
//! variables, falls back to defaults for anything unset, and is checked with
//! [`ConfigLoader::validate`] before use.
//!
//! Override hierarchy: defaults < .env < environment < command line flags.
//!
//! # Example
//!
//! ```no_run
//! use implicit_rec_core::config::{load_dotenv, ConfigLoader, DataConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! load_dotenv();
//!
//! let data_config = DataConfig::from_env()?;
//! data_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::RecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration from
/// environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if an environment variable is set but cannot be
    /// parsed into the expected type.
    fn from_env() -> Result<Self, RecError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the offending key if any check fails.
    fn validate(&self) -> Result<(), RecError>;
}

/// On-disk layout used to persist factor matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorFormat {
    /// Two tab-separated text files, one row per user / item
    Tsv,
    /// Single bincode snapshot with training metadata
    Snapshot,
}

impl fmt::Display for FactorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorFormat::Tsv => write!(f, "tsv"),
            FactorFormat::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl FromStr for FactorFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" => Ok(FactorFormat::Tsv),
            "snapshot" | "bincode" => Ok(FactorFormat::Snapshot),
            other => Err(format!(
                "unknown factor format '{}' (expected tsv or snapshot)",
                other
            )),
        }
    }
}

/// Data location configuration
///
/// # Environment Variables
///
/// - `IMPLICIT_REC_RATINGS_PATH`: tab-separated ratings file (default: `ml-100k/u.data`)
/// - `IMPLICIT_REC_CATALOG_PATH`: pipe-separated item catalog (default: `ml-100k/u.item`)
/// - `IMPLICIT_REC_FACTOR_DIR`: directory holding persisted factors (default: `tmp`)
/// - `IMPLICIT_REC_FACTOR_FORMAT`: `tsv` or `snapshot` (default: `tsv`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub ratings_path: PathBuf,
    pub catalog_path: PathBuf,
    pub factor_dir: PathBuf,
    pub factor_format: FactorFormat,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ratings_path: PathBuf::from("ml-100k/u.data"),
            catalog_path: PathBuf::from("ml-100k/u.item"),
            factor_dir: PathBuf::from("tmp"),
            factor_format: FactorFormat::Tsv,
        }
    }
}

impl ConfigLoader for DataConfig {
    fn from_env() -> Result<Self, RecError> {
        let defaults = DataConfig::default();

        Ok(Self {
            ratings_path: parse_env_var("IMPLICIT_REC_RATINGS_PATH", defaults.ratings_path)?,
            catalog_path: parse_env_var("IMPLICIT_REC_CATALOG_PATH", defaults.catalog_path)?,
            factor_dir: parse_env_var("IMPLICIT_REC_FACTOR_DIR", defaults.factor_dir)?,
            factor_format: parse_env_var("IMPLICIT_REC_FACTOR_FORMAT", defaults.factor_format)?,
        })
    }

    fn validate(&self) -> Result<(), RecError> {
        if self.ratings_path.as_os_str().is_empty() {
            return Err(RecError::invalid_config(
                "ratings_path must not be empty",
                "IMPLICIT_REC_RATINGS_PATH",
            ));
        }

        if self.factor_dir.as_os_str().is_empty() {
            return Err(RecError::invalid_config(
                "factor_dir must not be empty",
                "IMPLICIT_REC_FACTOR_DIR",
            ));
        }

        Ok(())
    }
}

/// Parse an environment variable, returning `default` when it is unset
///
/// # Errors
///
/// Returns `InvalidConfig` keyed by the variable name when the value is present
/// but does not parse.
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T, RecError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| RecError::InvalidConfig {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            })
        })
        .unwrap_or(Ok(default))
}

/// Parse an optional environment variable; unset or empty yields `None`
pub fn parse_optional_env_var<T>(key: &str) -> Result<Option<T>, RecError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RecError::InvalidConfig {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            }),
        _ => Ok(None),
    }
}

/// Load .env file if present
///
/// A missing .env file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_data_config_default() {
        let config = DataConfig::default();
        assert_eq!(config.ratings_path, PathBuf::from("ml-100k/u.data"));
        assert_eq!(config.catalog_path, PathBuf::from("ml-100k/u.item"));
        assert_eq!(config.factor_dir, PathBuf::from("tmp"));
        assert_eq!(config.factor_format, FactorFormat::Tsv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_config_from_env() {
        env::set_var("IMPLICIT_REC_RATINGS_PATH", "/data/ratings.tsv");
        env::set_var("IMPLICIT_REC_FACTOR_FORMAT", "snapshot");

        let config = DataConfig::from_env().unwrap();
        assert_eq!(config.ratings_path, PathBuf::from("/data/ratings.tsv"));
        assert_eq!(config.factor_format, FactorFormat::Snapshot);

        env::remove_var("IMPLICIT_REC_RATINGS_PATH");
        env::remove_var("IMPLICIT_REC_FACTOR_FORMAT");
    }

    #[test]
    fn test_data_config_rejects_empty_factor_dir() {
        let config = DataConfig {
            factor_dir: PathBuf::new(),
            ..DataConfig::default()
        };
        let err = config.validate().unwrap_err();
        match err {
            RecError::InvalidConfig { key, .. } => {
                assert_eq!(key.as_deref(), Some("IMPLICIT_REC_FACTOR_DIR"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_env_var_default_and_error() {
        env::remove_var("IMPLICIT_REC_TEST_UNSET");
        assert_eq!(parse_env_var("IMPLICIT_REC_TEST_UNSET", 7usize).unwrap(), 7);

        env::set_var("IMPLICIT_REC_TEST_BAD_NUMBER", "seven");
        let err = parse_env_var("IMPLICIT_REC_TEST_BAD_NUMBER", 7usize).unwrap_err();
        assert!(err.is_invalid_config());
        env::remove_var("IMPLICIT_REC_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_parse_optional_env_var() {
        env::set_var("IMPLICIT_REC_TEST_OPTIONAL", "  ");
        assert_eq!(
            parse_optional_env_var::<u64>("IMPLICIT_REC_TEST_OPTIONAL").unwrap(),
            None
        );

        env::set_var("IMPLICIT_REC_TEST_OPTIONAL", "42");
        assert_eq!(
            parse_optional_env_var::<u64>("IMPLICIT_REC_TEST_OPTIONAL").unwrap(),
            Some(42)
        );
        env::remove_var("IMPLICIT_REC_TEST_OPTIONAL");
    }

    #[test]
    fn test_factor_format_parsing() {
        assert_eq!("TSV".parse::<FactorFormat>().unwrap(), FactorFormat::Tsv);
        assert_eq!(
            "bincode".parse::<FactorFormat>().unwrap(),
            FactorFormat::Snapshot
        );
        assert!("csv".parse::<FactorFormat>().is_err());
        assert_eq!(FactorFormat::Snapshot.to_string(), "snapshot");
    }
}
