//! SQLite-backed store.
//!
//! Records of every collection live in one `records` table as JSON documents;
//! `sequences` holds the last id handed out per collection.
//! Column access compiles to `json_extract(data, ?)` with the JSON path bound
//! as a parameter, so field names never reach the SQL text.

use crate::error::{StoreError, StoreResult};
use crate::query::{Direction, FilterOp, Query, Row};
use crate::store::Store;
use crate::txn::{lock_for_caller, TxnOwner};
use modelkit_model::{CollectionSchema, Fields, Record, RecordId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

struct Inner {
    conn: Connection,
    schemas: BTreeMap<String, CollectionSchema>,
    txn: TxnOwner,
}

impl Inner {
    fn schema(&self, collection: &str) -> StoreResult<&CollectionSchema> {
        self.schemas
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }
}

/// A [`Store`] persisted in a SQLite database file.
pub struct SqliteStore {
    inner: Mutex<Inner>,
    released: Condvar,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id INTEGER NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE TABLE IF NOT EXISTS sequences (
                collection TEXT PRIMARY KEY,
                last_id INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                schemas: BTreeMap::new(),
                txn: TxnOwner::default(),
            }),
            released: Condvar::new(),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        lock_for_caller(&self.inner, &self.released, |inner| &inner.txn)
    }

    /// Commit and rollback never wait: only the owning thread may close a level.
    fn lock_owned(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Lock)
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Value::from(f),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Accumulates SQL text and its positional parameters together so the two
/// never drift out of order.
#[derive(Default)]
struct SqlBuilder {
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn bind(&mut self, value: SqlValue) -> &mut Self {
        self.sql.push('?');
        self.params.push(value);
        self
    }

    fn column(&mut self, alias: &str, field: &str) -> &mut Self {
        if field == "id" {
            self.sql.push_str(alias);
            self.sql.push_str(".id");
        } else {
            self.sql.push_str("json_extract(");
            self.sql.push_str(alias);
            self.sql.push_str(".data, ");
            self.bind(SqlValue::Text(json_path(field)));
            self.sql.push(')');
        }
        self
    }

    /// `WHERE` clause shared by fetch and count.
    fn predicate(&mut self, query: &Query) -> &mut Self {
        self.push(" WHERE r.collection = ")
            .bind(SqlValue::Text(query.collection.clone()));

        if let Some(search) = &query.search {
            self.push(" AND (");
            if search.columns.is_empty() {
                self.push("0");
            }
            let pattern = format!("%{}%", escape_like(&search.term.to_ascii_lowercase()));
            for (i, column) in search.columns.iter().enumerate() {
                if i > 0 {
                    self.push(" OR ");
                }
                self.push("LOWER(CAST(")
                    .column("r", column)
                    .push(" AS TEXT)) LIKE ")
                    .bind(SqlValue::Text(pattern.clone()))
                    .push(" ESCAPE '\\'");
            }
            self.push(")");
        }

        for filter in &query.filters {
            self.push(" AND ");
            match filter.op {
                FilterOp::In => {
                    self.column("r", &filter.field).push(" IN (");
                    let options = filter.value.as_array().map(Vec::as_slice).unwrap_or(&[]);
                    for (i, option) in options.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.bind(to_sql(option));
                    }
                    self.push(")");
                }
                op => {
                    let sql_op = match op {
                        FilterOp::Eq => " = ",
                        FilterOp::Ne => " <> ",
                        FilterOp::Lt => " < ",
                        FilterOp::Lte => " <= ",
                        FilterOp::Gt => " > ",
                        FilterOp::Gte => " >= ",
                        FilterOp::Like | FilterOp::In => " LIKE ",
                    };
                    self.column("r", &filter.field)
                        .push(sql_op)
                        .bind(to_sql(&filter.value));
                }
            }
        }
        self
    }
}

fn decode_fields(data: &str) -> StoreResult<Fields> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidData(format!("record data is not an object: {other}"))),
    }
}

impl Store for SqliteStore {
    fn register(&self, schema: CollectionSchema) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    fn schema(&self, collection: &str) -> StoreResult<CollectionSchema> {
        Ok(self.lock()?.schema(collection)?.clone())
    }

    fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<Record> {
        let inner = self.lock()?;
        inner.schema(collection)?;
        fields.remove("id");
        // Ids are never reused, even after deletes or a truncate.
        let next: i64 = inner.conn.query_row(
            "INSERT INTO sequences (collection, last_id) VALUES (?1, 1)
             ON CONFLICT(collection) DO UPDATE SET last_id = last_id + 1
             RETURNING last_id",
            params![collection],
            |row| row.get(0),
        )?;
        let data = serde_json::to_string(&fields)?;
        inner.conn.execute(
            "INSERT INTO records (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection, next, data],
        )?;
        Ok(Record::new(RecordId::new(next), collection, fields))
    }

    fn find(&self, collection: &str, id: RecordId) -> StoreResult<Option<Record>> {
        let inner = self.lock()?;
        inner.schema(collection)?;
        let data: Option<String> = inner
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id.get()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(d) => Ok(Some(Record::new(id, collection, decode_fields(&d)?))),
            None => Ok(None),
        }
    }

    fn update(&self, record: &Record, fields: Fields) -> StoreResult<bool> {
        let inner = self.lock()?;
        inner.schema(&record.collection)?;
        let current: Option<String> = inner
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![record.collection, record.id.get()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(false);
        };
        let mut merged = decode_fields(&current)?;
        for (k, v) in fields {
            if k != "id" {
                merged.insert(k, v);
            }
        }
        let changed = inner.conn.execute(
            "UPDATE records SET data = ?3 WHERE collection = ?1 AND id = ?2",
            params![record.collection, record.id.get(), serde_json::to_string(&merged)?],
        )?;
        Ok(changed == 1)
    }

    fn delete_where(&self, collection: &str, ids: &[RecordId]) -> StoreResult<usize> {
        let inner = self.lock()?;
        inner.schema(collection)?;
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM records WHERE collection = ? AND id IN ({placeholders})");
        let mut values = Vec::with_capacity(ids.len() + 1);
        values.push(SqlValue::Text(collection.to_string()));
        values.extend(ids.iter().map(|id| SqlValue::Integer(id.get())));
        Ok(inner.conn.execute(&sql, params_from_iter(values))?)
    }

    fn all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let inner = self.lock()?;
        inner.schema(collection)?;
        let mut stmt = inner
            .conn
            .prepare("SELECT id, data FROM records WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, data) = row?;
            out.push(Record::new(RecordId::new(id), collection, decode_fields(&data)?));
        }
        Ok(out)
    }

    fn truncate(&self, collection: &str) -> StoreResult<()> {
        let inner = self.lock()?;
        inner.schema(collection)?;
        inner
            .conn
            .execute("DELETE FROM records WHERE collection = ?1", params![collection])?;
        Ok(())
    }

    fn begin(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let open = inner.txn.depth();
        if open == 0 {
            inner.conn.execute_batch("BEGIN")?;
        } else {
            inner.conn.execute_batch(&format!("SAVEPOINT sp{open}"))?;
        }
        let depth = inner.txn.enter();
        debug!("sqlite store: begin (depth {depth})");
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut inner = self.lock_owned()?;
        let depth = inner.txn.leave()?;
        if depth > 0 {
            inner.conn.execute_batch(&format!("RELEASE sp{depth}"))?;
            return Ok(());
        }
        let result = inner.conn.execute_batch("COMMIT");
        if result.is_err() && !inner.conn.is_autocommit() {
            // A failed COMMIT leaves the transaction open; close it.
            if let Err(e) = inner.conn.execute_batch("ROLLBACK") {
                warn!("sqlite store: rollback after failed commit: {e}");
            }
        }
        self.released.notify_all();
        Ok(result?)
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut inner = self.lock_owned()?;
        let depth = inner.txn.leave()?;
        let result = if depth == 0 {
            inner.conn.execute_batch("ROLLBACK")
        } else {
            inner
                .conn
                .execute_batch(&format!("ROLLBACK TO sp{depth}; RELEASE sp{depth}"))
        };
        if depth == 0 {
            self.released.notify_all();
        }
        if let Err(e) = &result {
            warn!("sqlite store: rollback failed: {e}");
        }
        debug!("sqlite store: rolled back (depth {depth})");
        Ok(result?)
    }

    fn fetch(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let inner = self.lock()?;
        let schema = inner.schema(&query.collection)?;

        let mut relations = Vec::with_capacity(query.counts.len());
        for name in &query.counts {
            let rel = schema
                .find_relation(name)
                .ok_or_else(|| StoreError::UnknownRelation {
                    collection: query.collection.clone(),
                    relation: name.clone(),
                })?;
            inner.schema(&rel.target)?;
            relations.push(rel);
        }

        let mut b = SqlBuilder::default();
        b.push("SELECT r.id");
        for column in &query.select {
            b.push(", ").column("r", column);
        }
        for rel in &relations {
            b.push(", (SELECT COUNT(*) FROM records c WHERE c.collection = ")
                .bind(SqlValue::Text(rel.target.clone()))
                .push(" AND ")
                .column("c", &rel.foreign_key)
                .push(" = r.id)");
        }
        b.push(" FROM records r").predicate(query);

        b.push(" ORDER BY ");
        for order in &query.order {
            b.column("r", &order.field).push(match order.direction {
                Direction::Asc => " ASC, ",
                Direction::Desc => " DESC, ",
            });
        }
        b.push("r.id ASC LIMIT ");
        b.bind(SqlValue::Integer(
            query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)),
        ));
        b.push(" OFFSET ")
            .bind(SqlValue::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));

        debug!("sqlite store: {}", b.sql);
        let mut stmt = inner.conn.prepare(&b.sql)?;
        let width = 1 + query.select.len() + relations.len();
        let rows = stmt.query_map(params_from_iter(b.params.iter()), |row| {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(row.get::<_, SqlValue>(i)?);
            }
            Ok(cells)
        })?;

        let mut out = Vec::new();
        for row in rows {
            let mut cells = row?.into_iter();
            let id = match cells.next() {
                Some(SqlValue::Integer(id)) => RecordId::new(id),
                other => return Err(StoreError::InvalidData(format!("bad row id: {other:?}"))),
            };
            let mut values = Fields::new();
            let names = query.select.iter().chain(query.counts.iter());
            for (name, cell) in names.zip(cells) {
                values.insert(name.clone(), from_sql(cell));
            }
            out.push(Row { id, values });
        }
        Ok(out)
    }

    fn count(&self, query: &Query) -> StoreResult<u64> {
        let inner = self.lock()?;
        inner.schema(&query.collection)?;
        let mut b = SqlBuilder::default();
        b.push("SELECT COUNT(*) FROM records r").predicate(query);
        let count: i64 = inner
            .conn
            .query_row(&b.sql, params_from_iter(b.params.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_path_quotes_field_names() {
        assert_eq!(json_path("name"), "$.\"name\"");
        assert_eq!(json_path("we\"ird"), "$.\"we\\\"ird\"");
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn builder_keeps_params_in_order() {
        let query = Query::new("products")
            .search("mug", vec!["name".into()])
            .filter("price", FilterOp::Lt, Value::from(5));
        let mut b = SqlBuilder::default();
        b.push("SELECT COUNT(*) FROM records r").predicate(&query);
        assert_eq!(b.sql.matches('?').count(), b.params.len());
        assert_eq!(b.params[0], SqlValue::Text("products".into()));
        assert_eq!(b.params.last(), Some(&SqlValue::Integer(5)));
    }
}
