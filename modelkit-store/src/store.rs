use crate::error::StoreResult;
use crate::query::{Query, Row};
use modelkit_model::{CollectionSchema, Fields, Record, RecordId};
use std::collections::BTreeSet;

/// Persistence collaborator used by the lens and bulk layers.
///
/// Implementations own record storage, identifier assignment and transaction
/// isolation. Transactions nest: an inner `begin` opens a savepoint that its
/// matching `commit`/`rollback` releases or rewinds.
///
/// A transaction belongs to the thread that called `begin`. Until its
/// outermost level closes, calls from other threads block, and `commit` or
/// `rollback` from another thread fail with
/// [`StoreError::NoTransaction`](crate::StoreError::NoTransaction). Run a
/// transaction start to finish on one thread.
pub trait Store: Send + Sync {
    /// Declares a collection. Re-registering replaces the schema, keeping records.
    fn register(&self, schema: CollectionSchema) -> StoreResult<()>;

    fn schema(&self, collection: &str) -> StoreResult<CollectionSchema>;

    /// Inserts a record. An `id` key in `fields` is ignored; the store assigns one.
    fn create(&self, collection: &str, fields: Fields) -> StoreResult<Record>;

    fn find(&self, collection: &str, id: RecordId) -> StoreResult<Option<Record>>;

    /// Merges `fields` into the stored record. Returns `false` when the record
    /// no longer exists.
    fn update(&self, record: &Record, fields: Fields) -> StoreResult<bool>;

    /// Deletes every listed record in one operation, returning the number removed.
    fn delete_where(&self, collection: &str, ids: &[RecordId]) -> StoreResult<usize>;

    /// Every record of the collection in id order.
    fn all(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// Removes every record of the collection.
    fn truncate(&self, collection: &str) -> StoreResult<()>;

    fn begin(&self) -> StoreResult<()>;

    fn commit(&self) -> StoreResult<()>;

    fn rollback(&self) -> StoreResult<()>;

    /// Rows matching `query`, projected and windowed.
    fn fetch(&self, query: &Query) -> StoreResult<Vec<Row>>;

    /// Number of records matching the query's search and filters.
    fn count(&self, query: &Query) -> StoreResult<u64>;

    fn known_columns(&self, collection: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self.schema(collection)?.known_columns())
    }

    /// Whether the collection exposes a relation called `name`.
    fn has_capability(&self, collection: &str, name: &str) -> bool {
        self.schema(collection)
            .map(|s| s.find_relation(name).is_some())
            .unwrap_or(false)
    }
}
