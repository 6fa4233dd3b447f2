mod common;

use common::{fields, products};
use modelkit_bulk::{
    AllowAll, AuditDecision, AuditSink, BulkError, BulkMutator, MemoryAuditSink, StatusToggle,
};
use modelkit_model::{Model, Record, RecordId};
use modelkit_store::{MemoryStore, Store};
use pretty_assertions::assert_eq;
use serde_json::json;

fn store(model: &Model) -> MemoryStore {
    let store = MemoryStore::new();
    store.register(model.schema().clone()).unwrap();
    store
        .create("products", fields(json!({"name": "Mug", "is_active": true})))
        .unwrap();
    store
        .create("products", fields(json!({"name": "Teapot", "is_active": 0})))
        .unwrap();
    store
}

#[test]
fn toggle_flips_and_audits() {
    let model = products();
    let store = store(&model);
    let audit = MemoryAuditSink::new();
    let toggle = StatusToggle::new(BulkMutator::new(&store, &model), &AllowAll, &audit);

    let record = toggle.toggle_status(RecordId::new(1), "admin").unwrap();
    assert_eq!(record.get("is_active"), Some(&json!(false)));
    let stored = store.find("products", RecordId::new(1)).unwrap().unwrap();
    assert_eq!(stored.get("is_active"), Some(&json!(false)));

    let record = toggle.toggle_status(RecordId::new(2), "admin").unwrap();
    assert_eq!(record.get("is_active"), Some(&json!(1)));

    let entries = audit.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].actor, "admin");
    assert_eq!(entries[0].collection, "products");
    assert_eq!(entries[0].record, RecordId::new(1));
    assert_eq!(entries[0].old_status, json!(true));
    assert_eq!(entries[0].new_status, json!(false));
    assert_eq!(entries[0].decision, AuditDecision::Allowed);
    assert!(entries[0].timestamp <= entries[1].timestamp);
}

#[test]
fn denied_change_is_audited_and_not_applied() {
    let model = products();
    let store = store(&model);
    let audit = MemoryAuditSink::new();
    let only_admins = |actor: &str, _: &Model, _: &Record| actor == "admin";
    let toggle = StatusToggle::new(BulkMutator::new(&store, &model), &only_admins, &audit);

    let err = toggle
        .set_status(RecordId::new(1), json!(false), "guest")
        .unwrap_err();
    assert!(matches!(
        err,
        BulkError::Unauthorized { ref actor, id, .. } if actor == "guest" && id == RecordId::new(1)
    ));
    let stored = store.find("products", RecordId::new(1)).unwrap().unwrap();
    assert_eq!(stored.get("is_active"), Some(&json!(true)));

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].decision, AuditDecision::Denied);

    toggle
        .set_status(RecordId::new(1), json!(false), "admin")
        .unwrap();
    assert_eq!(audit.entries().len(), 2);
}

#[test]
fn missing_record_is_not_found_and_not_audited() {
    let model = products();
    let store = store(&model);
    let audit = MemoryAuditSink::new();
    let toggle = StatusToggle::new(BulkMutator::new(&store, &model), &AllowAll, &audit);

    let err = toggle.toggle_status(RecordId::new(9), "admin").unwrap_err();
    assert!(matches!(err, BulkError::NotFound { id, .. } if id == RecordId::new(9)));
    assert!(audit.entries().is_empty());
}

#[test]
fn audit_sink_failure_blocks_the_change() {
    struct Broken;

    impl AuditSink for Broken {
        fn record(&self, _: modelkit_bulk::AuditEntry) -> modelkit_bulk::BulkResult<()> {
            Err(BulkError::Audit("disk full".into()))
        }
    }

    let model = products();
    let store = store(&model);
    let toggle = StatusToggle::new(BulkMutator::new(&store, &model), &AllowAll, &Broken);
    assert!(matches!(
        toggle.toggle_status(RecordId::new(1), "admin"),
        Err(BulkError::Audit(_))
    ));
    let stored = store.find("products", RecordId::new(1)).unwrap().unwrap();
    assert_eq!(stored.get("is_active"), Some(&json!(true)));
}
