//! # Implicit Rec Core
//!
//! Shared building blocks for the implicit-feedback recommender workspace.
//!
//! ## Modules
//!
//! - `error`: Error taxonomy shared by solver, recommender and stores
//! - `config`: Environment-driven configuration loading and validation
//! - `observability`: Structured logging setup

pub mod config;
pub mod error;
pub mod observability;

// Re-export commonly used types
pub use config::{
    load_dotenv, parse_env_var, parse_optional_env_var, ConfigLoader, DataConfig, FactorFormat,
};
pub use error::{RecError, SolveSide};
pub use observability::{init_logging, LogConfig, LogFormat};

/// Result type alias for implicit-rec operations
pub type Result<T> = std::result::Result<T, RecError>;
