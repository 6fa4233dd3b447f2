use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Describes a collection's columns and the relations it exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Column names known to the store. The `id` primary key is always present.
    pub fn known_columns(&self) -> BTreeSet<String> {
        let mut known: BTreeSet<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        known.insert("id".to_string());
        known
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == "id" || self.columns.iter().any(|c| c.name == name)
    }

    pub fn find_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Names of columns marked searchable.
    pub fn searchable_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.searchable)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A column of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default)]
    pub searchable: bool,
}

impl Column {
    fn simple(name: &str, column_type: ColumnType, searchable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            searchable,
        }
    }

    /// Shorthand for a text column.
    pub fn text(name: &str, searchable: bool) -> Self {
        Self::simple(name, ColumnType::Text, searchable)
    }

    pub fn integer(name: &str) -> Self {
        Self::simple(name, ColumnType::Integer, false)
    }

    pub fn number(name: &str) -> Self {
        Self::simple(name, ColumnType::Number, false)
    }

    pub fn boolean(name: &str) -> Self {
        Self::simple(name, ColumnType::Boolean, false)
    }

    pub fn json(name: &str) -> Self {
        Self::simple(name, ColumnType::Json, false)
    }
}

/// The storage type of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Number,
    Boolean,
    Json,
}

/// A has-many association: `target` records point back through `foreign_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub target: String,
    pub foreign_key: String,
}

impl Relation {
    pub fn has_many(name: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
        }
    }
}
