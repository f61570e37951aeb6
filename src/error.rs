//! Error types for the epochal training engine

use thiserror::Error;

/// Main error type for epochal operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid settings, class-count mismatch)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tensor operation error (shape/dtype mismatch, device transfer)
    #[error("Tensor operation error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A batch source produced no batches where at least one is required
    #[error("Empty batch source: {0}")]
    EmptySource(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for epochal operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an empty source error
    pub fn empty_source(msg: impl Into<String>) -> Self {
        Self::EmptySource(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
