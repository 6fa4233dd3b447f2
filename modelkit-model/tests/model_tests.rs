use modelkit_model::{
    CollectionSchema, Column, Fields, FieldListExporter, Model, ModelError, ModelRegistry,
    Record, RecordId, Ruleset,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn fields(v: Value) -> Fields {
    v.as_object().cloned().unwrap()
}

fn products() -> CollectionSchema {
    CollectionSchema::new("products")
        .column(Column::text("name", true))
        .column(Column::number("price"))
}

fn record() -> Record {
    Record::new(RecordId::new(1), "products", fields(json!({"name": "Mug", "price": 4})))
}

// ── Capabilities ─────────────────────────────────────────────────

#[test]
fn model_without_rules_accepts_everything() {
    let model = Model::new(products());
    assert!(!model.has_rules());
    assert!(model.validate(&fields(json!({}))));
    assert!(model.violations(&fields(json!({}))).is_empty());
}

#[test]
fn model_with_rules_validates() {
    let model = Model::new(products()).with_rules(Ruleset::new().field("name", "required").unwrap());
    assert!(model.has_rules());
    assert!(!model.validate(&fields(json!({"price": 1}))));
    assert_eq!(model.violations(&fields(json!({"price": 1}))).len(), 1);
}

#[test]
fn export_defaults_to_full_dump() {
    let model = Model::new(products());
    assert!(!model.has_exporter());
    assert_eq!(model.export(&record()), fields(json!({"id": 1, "name": "Mug", "price": 4})));
}

#[test]
fn export_uses_closure_hook() {
    let model = Model::new(products()).with_exporter(|r: &Record| {
        let mut out = Fields::new();
        out.insert("label".into(), json!(r.get_str("name").unwrap_or_default().to_uppercase()));
        out
    });
    assert!(model.has_exporter());
    assert_eq!(model.export(&record()), fields(json!({"label": "MUG"})));
}

#[test]
fn field_list_exporter_skips_missing_fields() {
    let model = Model::new(products())
        .with_exporter(FieldListExporter::new(vec!["name".into(), "color".into()]));
    assert_eq!(model.export(&record()), fields(json!({"name": "Mug"})));
}

#[test]
fn status_field_defaults_and_overrides() {
    assert_eq!(Model::new(products()).status_field(), "status");
    assert_eq!(Model::new(products()).with_status_field("state").status_field(), "state");
}

#[test]
fn model_debug_hides_exporter_body() {
    let model = Model::new(products()).with_exporter(FieldListExporter::new(vec![]));
    let debug = format!("{model:?}");
    assert!(debug.contains("has_exporter: true"));
    assert!(debug.contains("products"));
}

// ── Registry ─────────────────────────────────────────────────────

const CONFIG: &str = r#"{
    "models": [
        {
            "name": "customers",
            "columns": [{"name": "name", "type": "text", "searchable": true}],
            "relations": [{"name": "orders", "target": "orders", "foreign_key": "customer_id"}],
            "rules": {"name": "required|string|max:255"},
            "export_fields": ["id", "name"]
        },
        {
            "name": "orders",
            "columns": [{"name": "customer_id", "type": "integer"}, {"name": "total", "type": "number"}],
            "status_field": "state"
        }
    ]
}"#;

#[test]
fn registry_loads_models_from_json() {
    let registry = ModelRegistry::from_json(CONFIG).unwrap();
    assert_eq!(registry.len(), 2);

    let customers = registry.get("customers").unwrap();
    assert!(customers.has_rules());
    assert!(customers.has_exporter());
    assert!(customers.schema().find_relation("orders").is_some());

    let orders = registry.get("orders").unwrap();
    assert!(!orders.has_rules());
    assert_eq!(orders.status_field(), "state");
    assert!(registry.get("reviews").is_none());
}

#[test]
fn registry_loads_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.json");
    std::fs::write(&path, CONFIG).unwrap();
    assert_eq!(ModelRegistry::from_path(&path).unwrap().len(), 2);
}

#[test]
fn registry_rejects_duplicates() {
    let mut registry = ModelRegistry::new();
    registry.insert(Model::new(products())).unwrap();
    let err = registry.insert(Model::new(products())).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateModel(name) if name == "products"));
}

#[test]
fn registry_rejects_malformed_json() {
    assert!(matches!(
        ModelRegistry::from_json("{\"models\": 3}"),
        Err(ModelError::Serialization(_))
    ));
}
