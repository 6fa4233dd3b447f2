#![allow(dead_code)]

use modelkit_model::{CollectionSchema, Column, Fields, Model, Record, RecordId, Ruleset};
use modelkit_store::{MemoryStore, Query, Row, Store, StoreError, StoreResult};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn fields(v: Value) -> Fields {
    v.as_object().cloned().unwrap()
}

/// `products` with `name: required|string|max:20` and `price: nullable|numeric|min:0`.
pub fn products() -> Model {
    Model::new(
        CollectionSchema::new("products")
            .column(Column::text("name", true))
            .column(Column::number("price"))
            .column(Column::boolean("is_active")),
    )
    .with_rules(
        Ruleset::new()
            .field("name", "required|string|max:20")
            .unwrap()
            .field("price", "nullable|numeric|min:0")
            .unwrap(),
    )
    .with_status_field("is_active")
}

pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get_str("name").map(String::from))
        .collect()
}

/// Fields of every record, without ids, in id order.
pub fn contents<S: Store + ?Sized>(store: &S, collection: &str) -> Vec<Fields> {
    store
        .all(collection)
        .unwrap()
        .into_iter()
        .map(|r| r.fields)
        .collect()
}

/// Delegates to a [`MemoryStore`], counting creates and optionally failing
/// the create with the given zero-based index.
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub creates: AtomicUsize,
    pub fail_at: Option<usize>,
}

impl FaultyStore {
    pub fn new(model: &Model) -> Self {
        let inner = MemoryStore::new();
        inner.register(model.schema().clone()).unwrap();
        Self {
            inner,
            creates: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl Store for FaultyStore {
    fn register(&self, schema: CollectionSchema) -> StoreResult<()> {
        self.inner.register(schema)
    }
    fn schema(&self, collection: &str) -> StoreResult<CollectionSchema> {
        self.inner.schema(collection)
    }
    fn create(&self, collection: &str, fields: Fields) -> StoreResult<Record> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(n) {
            return Err(StoreError::InvalidData(format!("injected fault on create #{n}")));
        }
        self.inner.create(collection, fields)
    }
    fn find(&self, collection: &str, id: RecordId) -> StoreResult<Option<Record>> {
        self.inner.find(collection, id)
    }
    fn update(&self, record: &Record, fields: Fields) -> StoreResult<bool> {
        self.inner.update(record, fields)
    }
    fn delete_where(&self, collection: &str, ids: &[RecordId]) -> StoreResult<usize> {
        self.inner.delete_where(collection, ids)
    }
    fn all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.inner.all(collection)
    }
    fn truncate(&self, collection: &str) -> StoreResult<()> {
        self.inner.truncate(collection)
    }
    fn begin(&self) -> StoreResult<()> {
        self.inner.begin()
    }
    fn commit(&self) -> StoreResult<()> {
        self.inner.commit()
    }
    fn rollback(&self) -> StoreResult<()> {
        self.inner.rollback()
    }
    fn fetch(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.inner.fetch(query)
    }
    fn count(&self, query: &Query) -> StoreResult<u64> {
        self.inner.count(query)
    }
}
