//! JSON file import/export through a [`BlobStore`].

use crate::error::{BulkError, BulkResult};
use crate::mutator::BulkMutator;
use modelkit_blobstore::BlobStore;
use modelkit_model::Fields;
use modelkit_store::Store;
use serde_json::Value;
use tracing::{info, warn};

/// Parses an import payload: a JSON array whose elements are all objects.
pub fn parse_payload(bytes: &[u8]) -> BulkResult<Vec<Fields>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(items) = value else {
        return Err(BulkError::InvalidPayload("expected a JSON array".into()));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(fields),
            _ => Err(BulkError::InvalidPayload(format!(
                "element {index} is not an object"
            ))),
        })
        .collect()
}

impl<S: Store + ?Sized> BulkMutator<'_, S> {
    /// Imports the JSON array stored at `path`.
    ///
    /// A missing file or malformed content returns `false` without touching
    /// the store.
    pub fn import_from_file(&self, blobs: &dyn BlobStore, path: &str) -> bool {
        match self.read_payload(blobs, path) {
            Ok(items) => self.import_data(&items),
            Err(e) => {
                warn!("{}: import from `{path}` skipped: {e}", self.model().name());
                false
            }
        }
    }

    /// Writes [`export_data`](Self::export_data) to `path` as pretty-printed JSON.
    pub fn export_to_file(&self, blobs: &dyn BlobStore, path: &str) -> bool {
        match self.try_export_to_file(blobs, path) {
            Ok(count) => {
                info!("{}: exported {count} records to `{path}`", self.model().name());
                true
            }
            Err(e) => {
                warn!("{}: export to `{path}` failed: {e}", self.model().name());
                false
            }
        }
    }

    pub fn try_export_to_file(&self, blobs: &dyn BlobStore, path: &str) -> BulkResult<usize> {
        let records = self.export_data()?;
        let json = serde_json::to_vec_pretty(&records)?;
        blobs.put(path, &json)?;
        Ok(records.len())
    }

    fn read_payload(&self, blobs: &dyn BlobStore, path: &str) -> BulkResult<Vec<Fields>> {
        if !blobs.exists(path)? {
            return Err(BulkError::InvalidPayload(format!("`{path}` does not exist")));
        }
        parse_payload(&blobs.get(path)?)
    }
}
