use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A record's field-name → value mapping.
pub type Fields = serde_json::Map<String, Value>;

/// Store-assigned identifier of a record within its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Reads an identifier out of a JSON value.
    ///
    /// Accepts integers and integer strings, since request payloads carry both.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self),
            Value::String(s) => s.trim().parse().ok().map(Self),
            _ => None,
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// A single persisted record.
///
/// The core never interprets `fields` beyond name lookups used for
/// validation, projection and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub collection: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, collection: impl Into<String>, fields: Fields) -> Self {
        Self {
            id,
            collection: collection.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// Full field dump, `id` included.
    pub fn to_fields(&self) -> Fields {
        let mut out = Fields::with_capacity(self.fields.len() + 1);
        out.insert("id".into(), Value::from(self.id.get()));
        for (k, v) in &self.fields {
            if k != "id" {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }
}
