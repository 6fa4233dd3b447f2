//! In-memory store.

use crate::error::{StoreError, StoreResult};
use crate::query::{like_matches, Direction, Filter, FilterOp, Key, Query, Row, Search};
use crate::store::Store;
use crate::txn::{lock_for_caller, TxnOwner};
use modelkit_model::{CollectionSchema, Fields, Record, RecordId};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
struct Collection {
    schema: CollectionSchema,
    rows: BTreeMap<RecordId, Fields>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeMap<String, Collection>,
    /// One snapshot per open transaction level.
    snapshots: Vec<BTreeMap<String, Collection>>,
    txn: TxnOwner,
}

impl Inner {
    fn collection(&self, name: &str) -> StoreResult<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> StoreResult<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }
}

/// A [`Store`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    released: Condvar,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given collections registered.
    pub fn with_schemas(schemas: impl IntoIterator<Item = CollectionSchema>) -> StoreResult<Self> {
        let store = Self::new();
        for schema in schemas {
            store.register(schema)?;
        }
        Ok(store)
    }

    /// Open transaction depth, whichever thread holds it.
    pub fn depth(&self) -> usize {
        self.inner.lock().map(|inner| inner.txn.depth()).unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        lock_for_caller(&self.inner, &self.released, |inner| &inner.txn)
    }

    /// Closes one level held by the current thread, restoring the snapshot
    /// taken when it opened if `rewind` is set. Returns the remaining depth.
    fn close_level(&self, rewind: bool) -> StoreResult<usize> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Lock)?;
        let depth = inner.txn.leave()?;
        let snapshot = inner.snapshots.pop().ok_or(StoreError::NoTransaction)?;
        if rewind {
            inner.collections = snapshot;
        }
        if depth == 0 {
            self.released.notify_all();
        }
        Ok(depth)
    }
}

impl Store for MemoryStore {
    fn register(&self, schema: CollectionSchema) -> StoreResult<()> {
        let mut inner = self.lock()?;
        match inner.collections.get_mut(&schema.name) {
            Some(existing) => existing.schema = schema,
            None => {
                inner.collections.insert(
                    schema.name.clone(),
                    Collection {
                        schema,
                        rows: BTreeMap::new(),
                        next_id: 1,
                    },
                );
            }
        }
        Ok(())
    }

    fn schema(&self, collection: &str) -> StoreResult<CollectionSchema> {
        Ok(self.lock()?.collection(collection)?.schema.clone())
    }

    fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<Record> {
        let mut inner = self.lock()?;
        let coll = inner.collection_mut(collection)?;
        fields.remove("id");
        let id = RecordId::new(coll.next_id);
        coll.next_id += 1;
        coll.rows.insert(id, fields.clone());
        Ok(Record::new(id, collection, fields))
    }

    fn find(&self, collection: &str, id: RecordId) -> StoreResult<Option<Record>> {
        let inner = self.lock()?;
        let coll = inner.collection(collection)?;
        Ok(coll
            .rows
            .get(&id)
            .map(|fields| Record::new(id, collection, fields.clone())))
    }

    fn update(&self, record: &Record, fields: Fields) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let coll = inner.collection_mut(&record.collection)?;
        let Some(stored) = coll.rows.get_mut(&record.id) else {
            return Ok(false);
        };
        for (k, v) in fields {
            if k != "id" {
                stored.insert(k, v);
            }
        }
        Ok(true)
    }

    fn delete_where(&self, collection: &str, ids: &[RecordId]) -> StoreResult<usize> {
        let mut inner = self.lock()?;
        let coll = inner.collection_mut(collection)?;
        Ok(ids.iter().filter(|id| coll.rows.remove(*id).is_some()).count())
    }

    fn all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let inner = self.lock()?;
        let coll = inner.collection(collection)?;
        Ok(coll
            .rows
            .iter()
            .map(|(id, fields)| Record::new(*id, collection, fields.clone()))
            .collect())
    }

    fn truncate(&self, collection: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.collection_mut(collection)?.rows.clear();
        Ok(())
    }

    fn begin(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let snapshot = inner.collections.clone();
        inner.snapshots.push(snapshot);
        let depth = inner.txn.enter();
        debug!("memory store: begin (depth {depth})");
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.close_level(false)?;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let depth = self.close_level(true)?;
        debug!("memory store: rolled back (depth {depth})");
        Ok(())
    }

    fn fetch(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let inner = self.lock()?;
        let coll = inner.collection(&query.collection)?;

        let mut matched: Vec<(RecordId, &Fields)> = coll
            .rows
            .iter()
            .filter(|(id, fields)| matches(query, **id, fields))
            .map(|(id, fields)| (*id, fields))
            .collect();

        matched.sort_by(|(a_id, a), (b_id, b)| {
            for order in &query.order {
                let ka = Key::of(field_value(*a_id, a, &order.field).as_ref());
                let kb = Key::of(field_value(*b_id, b, &order.field).as_ref());
                let ord = match order.direction {
                    Direction::Asc => ka.sort_cmp(&kb),
                    Direction::Desc => kb.sort_cmp(&ka),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a_id.cmp(b_id)
        });

        let mut relations: Vec<(&str, &str, &Collection)> = Vec::with_capacity(query.counts.len());
        for name in &query.counts {
            let rel = coll
                .schema
                .find_relation(name)
                .ok_or_else(|| StoreError::UnknownRelation {
                    collection: query.collection.clone(),
                    relation: name.clone(),
                })?;
            let target = inner.collection(&rel.target)?;
            relations.push((name.as_str(), rel.foreign_key.as_str(), target));
        }

        let window = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX));

        Ok(window
            .map(|(id, fields)| {
                let mut values = Fields::new();
                for column in &query.select {
                    values.insert(
                        column.clone(),
                        field_value(id, fields, column).unwrap_or(Value::Null),
                    );
                }
                for (alias, foreign_key, target) in &relations {
                    let count = target
                        .rows
                        .values()
                        .filter(|r| r.get(*foreign_key).and_then(Value::as_i64) == Some(id.get()))
                        .count();
                    values.insert((*alias).to_string(), Value::from(count));
                }
                Row { id, values }
            })
            .collect())
    }

    fn count(&self, query: &Query) -> StoreResult<u64> {
        let inner = self.lock()?;
        let coll = inner.collection(&query.collection)?;
        Ok(coll
            .rows
            .iter()
            .filter(|(id, fields)| matches(query, **id, fields))
            .count() as u64)
    }
}

fn field_value(id: RecordId, fields: &Fields, field: &str) -> Option<Value> {
    if field == "id" {
        Some(Value::from(id.get()))
    } else {
        fields.get(field).cloned()
    }
}

fn matches(query: &Query, id: RecordId, fields: &Fields) -> bool {
    query
        .search
        .as_ref()
        .is_none_or(|search| search_matches(search, id, fields))
        && query.filters.iter().all(|f| filter_matches(f, id, fields))
}

fn search_matches(search: &Search, id: RecordId, fields: &Fields) -> bool {
    let term = search.term.to_ascii_lowercase();
    search.columns.iter().any(|column| {
        Key::of(field_value(id, fields, column).as_ref())
            .as_text()
            .is_some_and(|text| text.to_ascii_lowercase().contains(&term))
    })
}

fn filter_matches(filter: &Filter, id: RecordId, fields: &Fields) -> bool {
    let actual = Key::of(field_value(id, fields, &filter.field).as_ref());
    match filter.op {
        FilterOp::In => match &filter.value {
            Value::Array(options) => options
                .iter()
                .any(|o| actual.filter_cmp(&Key::of(Some(o))) == Some(Ordering::Equal)),
            _ => false,
        },
        FilterOp::Like => match (actual.as_text(), filter.value.as_str()) {
            (Some(text), Some(pattern)) => like_matches(pattern, &text),
            _ => false,
        },
        op => {
            let Some(ord) = actual.filter_cmp(&Key::of(Some(&filter.value))) else {
                return false;
            };
            match op {
                FilterOp::Eq => ord == Ordering::Equal,
                FilterOp::Ne => ord != Ordering::Equal,
                FilterOp::Lt => ord == Ordering::Less,
                FilterOp::Lte => ord != Ordering::Greater,
                FilterOp::Gt => ord == Ordering::Greater,
                FilterOp::Gte => ord != Ordering::Less,
                FilterOp::In | FilterOp::Like => false,
            }
        }
    }
}
