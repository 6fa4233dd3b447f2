//! Core record model for modelkit.
//!
//! Defines the types every other modelkit crate depends on:
//! - [`Record`]: an externally persisted row (id, collection, field map)
//! - [`CollectionSchema`]: a collection's known columns and declared relations
//! - [`Ruleset`]: per-field validation rules, parsed from pipe syntax
//! - [`Model`]: the descriptor a caller hands to the lens and bulk layers,
//!   with its optional capabilities (ruleset, export hook) resolved up front
//! - [`ModelRegistry`]: models loaded from a JSON configuration file

mod error;
mod model;
mod record;
mod registry;
mod rules;
mod schema;

pub use error::{ModelError, ModelResult};
pub use model::{ExportFormatter, FieldListExporter, Model, DEFAULT_STATUS_FIELD};
pub use record::{Fields, Record, RecordId};
pub use registry::{ModelConfig, ModelRegistry};
pub use rules::{Rule, Ruleset, Violation};
pub use schema::{CollectionSchema, Column, ColumnType, Relation};
