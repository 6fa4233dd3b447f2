//! Engine-neutral query description.
//!
//! A [`Query`] names a collection, the columns to project, the relations to
//! count, and the search/filter/order/window clauses. Stores evaluate it
//! against their own representation; nothing here touches storage.

use modelkit_model::{Fields, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A projection + filter + window over one collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub collection: String,
    /// Projected columns. Empty projects nothing, not every column.
    pub select: Vec<String>,
    /// Relations whose row counts are added to each row, aliased to the relation name.
    pub counts: Vec<String>,
    pub search: Option<Search>,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_count(mut self, relation: impl Into<String>) -> Self {
        self.counts.push(relation.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>, columns: Vec<String>) -> Self {
        self.search = Some(Search {
            term: term.into(),
            columns,
        });
        self
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Same predicate, with projection, ordering and window stripped.
    pub fn for_count(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            search: self.search.clone(),
            filters: self.filters.clone(),
            ..Self::default()
        }
    }
}

/// Case-insensitive substring search, OR-combined over `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub term: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// SQL `LIKE` with `%`/`_` wildcards, ASCII case-insensitive.
    Like,
    /// Value must be an array; matches any element.
    In,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Like => "like",
            FilterOp::In => "in",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOp::Eq),
            "ne" => Ok(FilterOp::Ne),
            "lt" => Ok(FilterOp::Lt),
            "lte" => Ok(FilterOp::Lte),
            "gt" => Ok(FilterOp::Gt),
            "gte" => Ok(FilterOp::Gte),
            "like" => Ok(FilterOp::Like),
            "in" => Ok(FilterOp::In),
            other => Err(format!("unknown filter operator: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// One result row: the record id plus projected columns and relation counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    #[serde(skip)]
    pub id: RecordId,
    #[serde(flatten)]
    pub values: Fields,
}

/// Comparable form of a JSON value, ordered the way SQLite orders
/// `json_extract` results: null, then numbers (booleans as 0/1), then text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Key {
    Null,
    Num(f64),
    Text(String),
}

impl Key {
    pub(crate) fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Key::Null,
            Some(Value::Bool(b)) => Key::Num(if *b { 1.0 } else { 0.0 }),
            Some(Value::Number(n)) => n.as_f64().map_or(Key::Null, Key::Num),
            Some(Value::String(s)) => Key::Text(s.clone()),
            Some(other) => Key::Text(other.to_string()),
        }
    }

    /// Ordering for `ORDER BY`: total, NaN-free since JSON numbers are finite.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Null, Key::Null) => Ordering::Equal,
            (Key::Null, _) => Ordering::Less,
            (_, Key::Null) => Ordering::Greater,
            (Key::Num(a), Key::Num(b)) => a.total_cmp(b),
            (Key::Num(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Num(_)) => Ordering::Greater,
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
        }
    }

    /// Ordering for comparison filters: `None` when either side is null or the
    /// types differ, which makes the predicate false (SQL semantics).
    pub(crate) fn filter_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Key::Num(a), Key::Num(b)) => a.partial_cmp(b),
            (Key::Text(a), Key::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub(crate) fn as_text(&self) -> Option<String> {
        match self {
            Key::Null => None,
            Key::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Key::Num(n) => Some(n.to_string()),
            Key::Text(s) => Some(s.clone()),
        }
    }
}

/// SQL `LIKE` matching: `%` any run, `_` any single char, ASCII case-insensitive.
pub(crate) fn like_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let t: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    // Iterative wildcard match with single backtrack point.
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || (p[pi] != '%' && p[pi] == t[ti])) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_wildcards() {
        assert!(like_matches("%mug%", "Blue MUG large"));
        assert!(like_matches("m_g", "mug"));
        assert!(!like_matches("m_g", "mugs"));
        assert!(like_matches("%", ""));
        assert!(!like_matches("a%b", "acbd"));
        assert!(like_matches("a%b%", "acbd"));
    }

    #[test]
    fn key_sort_order_matches_sqlite() {
        let mut keys = vec![
            Key::of(Some(&json!("b"))),
            Key::of(Some(&json!(2))),
            Key::of(None),
            Key::of(Some(&json!(true))),
            Key::of(Some(&json!("a"))),
        ];
        keys.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            keys,
            vec![
                Key::Null,
                Key::Num(1.0),
                Key::Num(2.0),
                Key::Text("a".into()),
                Key::Text("b".into()),
            ]
        );
    }

    #[test]
    fn filter_cmp_rejects_mixed_types() {
        assert_eq!(Key::Num(1.0).filter_cmp(&Key::Text("1".into())), None);
        assert_eq!(Key::Null.filter_cmp(&Key::Null), None);
    }

    #[test]
    fn for_count_strips_window() {
        let q = Query::new("products")
            .select(["name"])
            .with_count("reviews")
            .filter("price", FilterOp::Gt, json!(3))
            .order_by("name", Direction::Desc)
            .limit(10)
            .offset(20);
        let c = q.for_count();
        assert!(c.select.is_empty());
        assert!(c.counts.is_empty());
        assert!(c.order.is_empty());
        assert_eq!(c.limit, None);
        assert_eq!(c.offset, 0);
        assert_eq!(c.filters, q.filters);
    }
}
