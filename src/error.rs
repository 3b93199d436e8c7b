//! Error types for the postr gateway.
//!
//! These cover startup and operational failures. Per-request rejections
//! (missing key, bad key, over quota) live in [`crate::gateway::Rejection`].

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid or inconsistent configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reading or merging configuration sources
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Identity directory could not be built
    #[error("Identity directory error: {0}")]
    Directory(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
