use modelkit_blobstore::BlobStoreError;
use modelkit_model::RecordId;
use modelkit_store::StoreError;
use thiserror::Error;

/// Result type for bulk operations.
pub type BulkResult<T> = Result<T, BulkError>;

/// Errors surfaced by the fallible bulk entry points.
///
/// The boolean-shaped operations swallow these and report `false`.
#[derive(Debug, Error)]
pub enum BulkError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Import payload was not an array of objects.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("record {id} not found in `{collection}`")]
    NotFound { collection: String, id: RecordId },

    /// The authorizer refused a status change.
    #[error("`{actor}` may not change status of {collection} {id}")]
    Unauthorized {
        actor: String,
        collection: String,
        id: RecordId,
    },

    #[error("audit sink error: {0}")]
    Audit(String),
}
