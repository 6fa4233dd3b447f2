use crate::record::{Fields, Record};
use crate::rules::{Ruleset, Violation};
use crate::schema::CollectionSchema;
use std::fmt;
use std::sync::Arc;

/// Field written by status toggles when a model does not name its own.
pub const DEFAULT_STATUS_FIELD: &str = "status";

/// Optional export hook: maps a record to its external representation.
///
/// Models without one export a full field dump.
pub trait ExportFormatter: Send + Sync {
    fn export(&self, record: &Record) -> Fields;
}

impl<F> ExportFormatter for F
where
    F: Fn(&Record) -> Fields + Send + Sync,
{
    fn export(&self, record: &Record) -> Fields {
        self(record)
    }
}

/// Exports only the listed fields, in list order.
#[derive(Debug, Clone)]
pub struct FieldListExporter {
    fields: Vec<String>,
}

impl FieldListExporter {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl ExportFormatter for FieldListExporter {
    fn export(&self, record: &Record) -> Fields {
        let all = record.to_fields();
        self.fields
            .iter()
            .filter_map(|f| all.get(f).map(|v| (f.clone(), v.clone())))
            .collect()
    }
}

/// Descriptor of a record collection as seen by the lens and bulk layers.
///
/// Capabilities are fixed when the descriptor is built, so callers never
/// check for them per operation.
#[derive(Clone)]
pub struct Model {
    schema: CollectionSchema,
    rules: Option<Ruleset>,
    exporter: Option<Arc<dyn ExportFormatter>>,
    status_field: String,
}

impl Model {
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            rules: None,
            exporter: None,
            status_field: DEFAULT_STATUS_FIELD.to_string(),
        }
    }

    pub fn with_rules(mut self, rules: Ruleset) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_exporter(mut self, exporter: impl ExportFormatter + 'static) -> Self {
        self.exporter = Some(Arc::new(exporter));
        self
    }

    pub fn with_status_field(mut self, field: &str) -> Self {
        self.status_field = field.to_string();
        self
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn status_field(&self) -> &str {
        &self.status_field
    }

    pub fn has_rules(&self) -> bool {
        self.rules.is_some()
    }

    pub fn rules(&self) -> Option<&Ruleset> {
        self.rules.as_ref()
    }

    /// A model without a ruleset accepts everything.
    pub fn validate(&self, data: &Fields) -> bool {
        self.rules.as_ref().is_none_or(|r| r.passes(data))
    }

    pub fn violations(&self, data: &Fields) -> Vec<Violation> {
        self.rules.as_ref().map(|r| r.violations(data)).unwrap_or_default()
    }

    pub fn has_exporter(&self) -> bool {
        self.exporter.is_some()
    }

    /// Export hook output, or the full field dump when no hook is set.
    pub fn export(&self, record: &Record) -> Fields {
        match &self.exporter {
            Some(exporter) => exporter.export(record),
            None => record.to_fields(),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("schema", &self.schema)
            .field("rules", &self.rules)
            .field("has_exporter", &self.exporter.is_some())
            .field("status_field", &self.status_field)
            .finish()
    }
}
