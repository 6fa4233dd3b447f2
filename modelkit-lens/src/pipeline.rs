//! Search, filter and sort stages applied to a lens query.

use crate::request::LensRequest;
use modelkit_model::CollectionSchema;
use modelkit_store::{Direction, FilterOp, Query};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Query transformations run by the lens, always in the order
/// `search`, `filter`, `sort`. Every stage defaults to the identity.
pub trait QueryPipeline {
    fn search(&self, query: Query, _request: &LensRequest) -> Query {
        query
    }

    fn filter(&self, query: Query, _request: &LensRequest) -> Query {
        query
    }

    fn sort(&self, query: Query, _request: &LensRequest) -> Query {
        query
    }
}

/// Leaves the query untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPipeline;

impl QueryPipeline for PassthroughPipeline {}

/// Applies the `search`, `filter[..]` and `sort` request parameters,
/// restricted to the collection's known columns.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    known: BTreeSet<String>,
    searchable: Vec<String>,
}

impl RequestPipeline {
    pub fn new(schema: &CollectionSchema) -> Self {
        Self {
            known: schema.known_columns(),
            searchable: schema
                .searchable_columns()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl QueryPipeline for RequestPipeline {
    fn search(&self, query: Query, request: &LensRequest) -> Query {
        let Some(term) = request.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return query;
        };
        if self.searchable.is_empty() {
            debug!("search on `{}` skipped: no searchable columns", query.collection);
            return query;
        }
        query.search(term, self.searchable.clone())
    }

    fn filter(&self, mut query: Query, request: &LensRequest) -> Query {
        for (key, raw) in &request.filters {
            let (field, op) = match key.split_once(':') {
                Some((field, op)) => match op.parse::<FilterOp>() {
                    Ok(op) => (field, op),
                    Err(e) => {
                        debug!("filter on `{field}` ignored: {e}");
                        continue;
                    }
                },
                None => (key.as_str(), FilterOp::Eq),
            };
            if !self.known.contains(field) {
                debug!("filter on unknown column `{field}` ignored");
                continue;
            }
            let value = match op {
                FilterOp::In => Value::Array(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(scalar)
                        .collect(),
                ),
                FilterOp::Like => Value::String(raw.clone()),
                _ => scalar(raw),
            };
            query = query.filter(field, op, value);
        }
        query
    }

    fn sort(&self, mut query: Query, request: &LensRequest) -> Query {
        let Some(sort) = request.sort.as_deref() else {
            return query;
        };
        for part in sort.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (field, direction) = match part.strip_prefix('-') {
                Some(field) => (field, Direction::Desc),
                None => (part.strip_prefix('+').unwrap_or(part), Direction::Asc),
            };
            if self.known.contains(field) {
                query = query.order_by(field, direction);
            } else {
                debug!("sort on unknown column `{field}` ignored");
            }
        }
        query
    }
}

/// Interprets a query-string value: integers, floats, `true`/`false` and
/// `null` become JSON scalars, anything else stays a string.
fn scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(raw.to_string()),
    }
}
