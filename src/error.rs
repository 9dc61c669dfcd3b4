//! Error types for the LunarDB service.

use thiserror::Error;

/// Main error type for LunarDB operations.
///
/// The admission core never fails; these cover the process boundary
/// (configuration loading and the listener).
#[derive(Error, Debug)]
pub enum LunarError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for LunarError {
    fn from(err: config::ConfigError) -> Self {
        LunarError::Config(err.to_string())
    }
}

/// Result type alias for LunarDB operations.
pub type Result<T> = std::result::Result<T, LunarError>;
