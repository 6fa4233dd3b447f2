//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collection was never registered with the store.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A query asked for a relation the collection does not declare.
    #[error("collection `{collection}` has no relation `{relation}`")]
    UnknownRelation { collection: String, relation: String },

    /// Commit or rollback without an open transaction.
    #[error("no transaction in progress")]
    NoTransaction,

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Lock,

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
