//! Error types for lens queries.

use modelkit_store::StoreError;
use thiserror::Error;

/// Result type for lens operations.
pub type LensResult<T> = Result<T, LensError>;

/// Errors raised while shaping or running a lens query.
#[derive(Debug, Error)]
pub enum LensError {
    /// The lens was run without declaring which model it targets.
    #[error("lens has no model declared")]
    MissingModel,

    /// A requested name is neither a column nor a relation of the collection.
    #[error("collection `{collection}` does not support relation `{relation}`")]
    UnsupportedRelation { collection: String, relation: String },

    /// The `pagination` parameter named an unknown strategy.
    #[error("unknown pagination strategy: {0}")]
    InvalidPagination(String),

    /// A cursor token could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Store error while executing the query.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LensError {
    /// Whether the error stems from the request or model setup rather than storage.
    pub fn is_configuration_fault(&self) -> bool {
        !matches!(self, LensError::Store(_))
    }
}
