use modelkit_model::{CollectionSchema, Column, ColumnType, Record, RecordId, Relation};
use pretty_assertions::assert_eq;
use serde_json::json;

fn customers() -> CollectionSchema {
    CollectionSchema::new("customers")
        .column(Column::text("name", true))
        .column(Column::text("email", true))
        .column(Column::integer("loyalty_points"))
        .relation(Relation::has_many("orders", "orders", "customer_id"))
}

// ── CollectionSchema ─────────────────────────────────────────────

#[test]
fn known_columns_include_primary_key() {
    let known: Vec<String> = customers().known_columns().into_iter().collect();
    assert_eq!(known, vec!["email", "id", "loyalty_points", "name"]);
}

#[test]
fn has_column_checks_declared_and_id() {
    let s = customers();
    assert!(s.has_column("id"));
    assert!(s.has_column("email"));
    assert!(!s.has_column("orders"));
}

#[test]
fn find_relation_by_name() {
    let s = customers();
    let rel = s.find_relation("orders").unwrap();
    assert_eq!(rel.target, "orders");
    assert_eq!(rel.foreign_key, "customer_id");
    assert!(s.find_relation("reviews").is_none());
}

#[test]
fn searchable_columns_in_declaration_order() {
    assert_eq!(customers().searchable_columns(), vec!["name", "email"]);
}

#[test]
fn column_type_defaults_to_text_in_config() {
    let col: Column = serde_json::from_str(r#"{"name": "sku"}"#).unwrap();
    assert_eq!(col.column_type, ColumnType::Text);
    assert!(!col.searchable);
}

#[test]
fn column_type_serde_uses_snake_case() {
    let json = serde_json::to_string(&Column::boolean("active")).unwrap();
    assert_eq!(json, r#"{"name":"active","type":"boolean","searchable":false}"#);
}

#[test]
fn schema_deserializes_without_relations() {
    let s: CollectionSchema =
        serde_json::from_str(r#"{"name": "tags", "columns": [{"name": "label"}]}"#).unwrap();
    assert_eq!(s.name, "tags");
    assert!(s.relations.is_empty());
}

// ── Record ───────────────────────────────────────────────────────

fn record() -> Record {
    let fields = json!({"name": "Ada", "vip": true, "balance": 12.5})
        .as_object()
        .cloned()
        .unwrap();
    Record::new(RecordId::new(7), "customers", fields)
}

#[test]
fn record_accessors() {
    let r = record();
    assert_eq!(r.get_str("name"), Some("Ada"));
    assert_eq!(r.get_bool("vip"), Some(true));
    assert_eq!(r.get_number("balance"), Some(12.5));
    assert_eq!(r.get_str("missing"), None);
    assert_eq!(r.get_str("vip"), None);
}

#[test]
fn record_to_fields_includes_id() {
    let dump = record().to_fields();
    assert_eq!(dump.get("id"), Some(&json!(7)));
    assert_eq!(dump.get("name"), Some(&json!("Ada")));
    assert_eq!(dump.len(), 4);
}

#[test]
fn record_id_from_value_accepts_numbers_and_strings() {
    assert_eq!(RecordId::from_value(&json!(3)), Some(RecordId::new(3)));
    assert_eq!(RecordId::from_value(&json!(" 42 ")), Some(RecordId::new(42)));
    assert_eq!(RecordId::from_value(&json!("abc")), None);
    assert_eq!(RecordId::from_value(&json!(1.5)), None);
    assert_eq!(RecordId::from_value(&json!(null)), None);
}

#[test]
fn record_id_display_and_parse() {
    let id: RecordId = "19".parse().unwrap();
    assert_eq!(id.get(), 19);
    assert_eq!(id.to_string(), "19");
    assert_eq!(serde_json::to_string(&id).unwrap(), "19");
}
