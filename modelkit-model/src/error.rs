//! Error types for model configuration.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or loading model descriptors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A rule string could not be parsed.
    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },

    /// The same model name was declared twice.
    #[error("duplicate model: {0}")]
    DuplicateModel(String),

    /// Configuration could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON was malformed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
