//! Error types shared by every implicit-rec crate
//!
//! Validation failures are reported before any computation starts, so a caller
//! that receives one of these errors can rely on no factor matrix having been
//! allocated or mutated.

use std::fmt;
use thiserror::Error;

/// Which half of the alternation a numerical failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveSide {
    /// Solving user factors with item factors fixed
    Users,
    /// Solving item factors with user factors fixed
    Items,
}

impl fmt::Display for SolveSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveSide::Users => write!(f, "user"),
            SolveSide::Items => write!(f, "item"),
        }
    }
}

/// Unified error type for factorization, recommendation and storage
#[derive(Debug, Error)]
pub enum RecError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
        key: Option<String>,
    },

    #[error("Numerical instability solving {side} row {row}: {message}")]
    NumericalInstability {
        side: SolveSide,
        row: usize,
        message: String,
    },

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RecError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RecError::InvalidInput {
            message: message.into(),
        }
    }

    /// Configuration error tied to a field or environment variable
    pub fn invalid_config(message: impl Into<String>, key: impl Into<String>) -> Self {
        RecError::InvalidConfig {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RecError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, RecError::InvalidInput { .. })
    }

    pub fn is_invalid_config(&self) -> bool {
        matches!(self, RecError::InvalidConfig { .. })
    }

    pub fn is_numerical_instability(&self) -> bool {
        matches!(self, RecError::NumericalInstability { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_carries_key() {
        let err = RecError::invalid_config("iterations must be greater than 0", "iterations");
        match &err {
            RecError::InvalidConfig { key, .. } => assert_eq!(key.as_deref(), Some("iterations")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_invalid_config());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: iterations must be greater than 0"
        );
    }

    #[test]
    fn test_numerical_instability_message() {
        let err = RecError::NumericalInstability {
            side: SolveSide::Items,
            row: 3,
            message: "matrix is singular".to_string(),
        };
        assert!(err.is_numerical_instability());
        assert_eq!(
            err.to_string(),
            "Numerical instability solving item row 3: matrix is singular"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = RecError::io("reading u.data", source);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("reading u.data"));
    }
}
