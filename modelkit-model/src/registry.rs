//! Model registry loaded from JSON configuration.
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "name": "customers",
//!       "columns": [{ "name": "name", "type": "text", "searchable": true }],
//!       "relations": [{ "name": "orders", "target": "orders", "foreign_key": "customer_id" }],
//!       "rules": { "name": "required|string|max:255" },
//!       "export_fields": ["id", "name"]
//!     }
//!   ]
//! }
//! ```

use crate::error::{ModelError, ModelResult};
use crate::model::{FieldListExporter, Model};
use crate::rules::Ruleset;
use crate::schema::CollectionSchema;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One model entry in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(flatten)]
    pub schema: CollectionSchema,
    #[serde(default)]
    pub rules: Option<Ruleset>,
    #[serde(default)]
    pub status_field: Option<String>,
    #[serde(default)]
    pub export_fields: Option<Vec<String>>,
}

impl ModelConfig {
    pub fn into_model(self) -> Model {
        let mut model = Model::new(self.schema);
        if let Some(rules) = self.rules {
            model = model.with_rules(rules);
        }
        if let Some(field) = self.status_field {
            model = model.with_status_field(&field);
        }
        if let Some(fields) = self.export_fields {
            model = model.with_exporter(FieldListExporter::new(fields));
        }
        model
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    models: Vec<ModelConfig>,
}

/// Models by collection name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> ModelResult<Self> {
        let file: RegistryFile = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for config in file.models {
            registry.insert(config.into_model())?;
        }
        Ok(registry)
    }

    pub fn from_path(path: &Path) -> ModelResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn insert(&mut self, model: Model) -> ModelResult<()> {
        if self.models.contains_key(model.name()) {
            return Err(ModelError::DuplicateModel(model.name().to_string()));
        }
        self.models.insert(model.name().to_string(), model);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
