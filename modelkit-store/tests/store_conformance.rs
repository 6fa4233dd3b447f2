//! Behavior every `Store` implementation must share, run against both.

use modelkit_model::{CollectionSchema, Column, Fields, RecordId, Relation};
use modelkit_store::{Direction, FilterOp, MemoryStore, Query, SqliteStore, Store, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;

fn fields(v: Value) -> Fields {
    v.as_object().cloned().unwrap()
}

fn schemas() -> Vec<CollectionSchema> {
    vec![
        CollectionSchema::new("customers")
            .column(Column::text("name", true))
            .column(Column::text("email", true))
            .column(Column::integer("points"))
            .relation(Relation::has_many("orders", "orders", "customer_id")),
        CollectionSchema::new("orders")
            .column(Column::integer("customer_id"))
            .column(Column::number("total")),
    ]
}

fn seed<S: Store>(store: &S) {
    for s in schemas() {
        store.register(s).unwrap();
    }
    for (name, email, points) in [
        ("Ada", "ada@example.com", 30),
        ("Grace", "grace@example.com", 10),
        ("Linus", "linus@example.org", 20),
    ] {
        store
            .create("customers", fields(json!({"name": name, "email": email, "points": points})))
            .unwrap();
    }
    for (customer, total) in [(1, 10.0), (1, 25.5), (3, 7.0)] {
        store
            .create("orders", fields(json!({"customer_id": customer, "total": total})))
            .unwrap();
    }
}

macro_rules! conformance {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;
            use pretty_assertions::assert_eq;

            fn names<S: Store + ?Sized>(s: &S) -> Vec<String> {
                s.all("customers")
                    .unwrap()
                    .iter()
                    .filter_map(|r| r.get_str("name").map(String::from))
                    .collect()
            }

            fn store() -> impl Store {
                let store = $make;
                seed(&store);
                store
            }

            // ── CRUD ─────────────────────────────────────────────

            #[test]
            fn create_assigns_sequential_ids_and_ignores_payload_id() {
                let s = store();
                let r = s.create("customers", fields(json!({"id": 99, "name": "Zed"}))).unwrap();
                assert_eq!(r.id, RecordId::new(4));
                assert!(r.get("id").is_none());
                assert_eq!(s.find("customers", RecordId::new(99)).unwrap(), None);
            }

            #[test]
            fn find_returns_stored_fields() {
                let s = store();
                let r = s.find("customers", RecordId::new(2)).unwrap().unwrap();
                assert_eq!(r.get_str("name"), Some("Grace"));
                assert_eq!(r.collection, "customers");
                assert!(s.find("customers", RecordId::new(42)).unwrap().is_none());
            }

            #[test]
            fn update_merges_fields() {
                let s = store();
                let r = s.find("customers", RecordId::new(1)).unwrap().unwrap();
                assert!(s.update(&r, fields(json!({"points": 31, "tier": "gold"}))).unwrap());
                let r = s.find("customers", RecordId::new(1)).unwrap().unwrap();
                assert_eq!(r.fields, fields(json!({
                    "name": "Ada", "email": "ada@example.com", "points": 31, "tier": "gold"
                })));
            }

            #[test]
            fn update_of_deleted_record_returns_false() {
                let s = store();
                let r = s.find("customers", RecordId::new(1)).unwrap().unwrap();
                s.delete_where("customers", &[r.id]).unwrap();
                assert!(!s.update(&r, fields(json!({"points": 1}))).unwrap());
            }

            #[test]
            fn delete_where_counts_removed_rows() {
                let s = store();
                let ids = [RecordId::new(1), RecordId::new(3), RecordId::new(77)];
                assert_eq!(s.delete_where("customers", &ids).unwrap(), 2);
                assert_eq!(s.delete_where("customers", &ids).unwrap(), 0);
                assert_eq!(s.delete_where("customers", &[]).unwrap(), 0);
                assert_eq!(s.all("customers").unwrap().len(), 1);
            }

            #[test]
            fn all_is_in_id_order() {
                let s = store();
                let ids: Vec<i64> = s.all("customers").unwrap().iter().map(|r| r.id.get()).collect();
                assert_eq!(ids, vec![1, 2, 3]);
            }

            #[test]
            fn truncate_clears_only_that_collection() {
                let s = store();
                s.truncate("customers").unwrap();
                assert!(s.all("customers").unwrap().is_empty());
                assert_eq!(s.all("orders").unwrap().len(), 3);
            }

            #[test]
            fn ids_are_not_reused_after_truncate() {
                let s = store();
                s.truncate("customers").unwrap();
                let r = s.create("customers", fields(json!({"name": "Next"}))).unwrap();
                assert_eq!(r.id, RecordId::new(4));
            }

            #[test]
            fn unknown_collection_is_an_error() {
                let s = store();
                assert!(matches!(
                    s.create("reviews", Fields::new()),
                    Err(StoreError::UnknownCollection(name)) if name == "reviews"
                ));
                assert!(s.all("reviews").is_err());
            }

            // ── Capabilities ─────────────────────────────────────

            #[test]
            fn known_columns_and_capabilities() {
                let s = store();
                let known: Vec<String> = s.known_columns("customers").unwrap().into_iter().collect();
                assert_eq!(known, vec!["email", "id", "name", "points"]);
                assert!(s.has_capability("customers", "orders"));
                assert!(!s.has_capability("customers", "reviews"));
                assert!(!s.has_capability("reviews", "orders"));
            }

            // ── Transactions ─────────────────────────────────────

            #[test]
            fn rollback_restores_prior_state() {
                let s = store();
                let before = s.all("customers").unwrap();
                s.begin().unwrap();
                s.truncate("customers").unwrap();
                s.create("customers", fields(json!({"name": "Temp"}))).unwrap();
                s.rollback().unwrap();
                assert_eq!(s.all("customers").unwrap(), before);
            }

            #[test]
            fn commit_keeps_changes() {
                let s = store();
                s.begin().unwrap();
                s.create("customers", fields(json!({"name": "Kept"}))).unwrap();
                s.commit().unwrap();
                assert_eq!(s.all("customers").unwrap().len(), 4);
            }

            #[test]
            fn nested_rollback_only_rewinds_inner_level() {
                let s = store();
                s.begin().unwrap();
                s.create("customers", fields(json!({"name": "Outer"}))).unwrap();
                s.begin().unwrap();
                s.create("customers", fields(json!({"name": "Inner"}))).unwrap();
                s.rollback().unwrap();
                s.commit().unwrap();
                assert_eq!(names(&s), vec!["Ada", "Grace", "Linus", "Outer"]);
            }

            #[test]
            fn commit_without_begin_fails() {
                let s = store();
                assert!(matches!(s.commit(), Err(StoreError::NoTransaction)));
                assert!(matches!(s.rollback(), Err(StoreError::NoTransaction)));
            }

            // ── Concurrent callers ───────────────────────────────

            #[test]
            fn rollback_keeps_other_threads_writes() {
                let s = Arc::new(store());
                s.begin().unwrap();
                s.create("customers", fields(json!({"name": "Temp"}))).unwrap();
                let writer = {
                    let s = Arc::clone(&s);
                    thread::spawn(move || {
                        s.create("customers", fields(json!({"name": "Other"}))).is_ok()
                    })
                };
                s.rollback().unwrap();
                assert!(writer.join().unwrap());
                assert_eq!(names(&*s), vec!["Ada", "Grace", "Linus", "Other"]);
            }

            #[test]
            fn second_transaction_waits_for_the_first() {
                let s = Arc::new(store());
                s.begin().unwrap();
                let other = {
                    let s = Arc::clone(&s);
                    thread::spawn(move || {
                        s.begin().unwrap();
                        s.create("customers", fields(json!({"name": "Discarded"}))).unwrap();
                        s.rollback().unwrap();
                    })
                };
                s.create("customers", fields(json!({"name": "Imported"}))).unwrap();
                s.commit().unwrap();
                other.join().unwrap();
                assert_eq!(names(&*s), vec!["Ada", "Grace", "Linus", "Imported"]);
            }

            #[test]
            fn only_the_opening_thread_can_close_a_transaction() {
                let s = Arc::new(store());
                s.begin().unwrap();
                s.create("customers", fields(json!({"name": "Kept"}))).unwrap();
                let closed = {
                    let s = Arc::clone(&s);
                    thread::spawn(move || {
                        (
                            matches!(s.rollback(), Err(StoreError::NoTransaction)),
                            matches!(s.commit(), Err(StoreError::NoTransaction)),
                        )
                    })
                    .join()
                    .unwrap()
                };
                assert_eq!(closed, (true, true));
                s.commit().unwrap();
                assert_eq!(s.all("customers").unwrap().len(), 4);
            }

            // ── Queries ──────────────────────────────────────────

            #[test]
            fn fetch_projects_only_selected_columns_and_counts() {
                let s = store();
                let rows = s
                    .fetch(&Query::new("customers").select(["name"]).with_count("orders"))
                    .unwrap();
                let data: Vec<Value> = rows.iter().map(|r| Value::Object(r.values.clone())).collect();
                assert_eq!(data, vec![
                    json!({"name": "Ada", "orders": 2}),
                    json!({"name": "Grace", "orders": 0}),
                    json!({"name": "Linus", "orders": 1}),
                ]);
            }

            #[test]
            fn empty_projection_yields_empty_rows() {
                let s = store();
                let rows = s.fetch(&Query::new("customers")).unwrap();
                assert_eq!(rows.len(), 3);
                assert!(rows.iter().all(|r| r.values.is_empty()));
                assert_eq!(rows[0].id, RecordId::new(1));
            }

            #[test]
            fn fetch_unknown_relation_fails() {
                let s = store();
                let err = s.fetch(&Query::new("customers").with_count("reviews")).unwrap_err();
                assert!(matches!(err, StoreError::UnknownRelation { relation, .. } if relation == "reviews"));
            }

            #[test]
            fn search_is_case_insensitive_substring() {
                let s = store();
                let q = Query::new("customers")
                    .select(["name"])
                    .search("EXAMPLE.COM", vec!["email".into()]);
                assert_eq!(s.count(&q).unwrap(), 2);
                let q = Query::new("customers").search("%", vec!["name".into()]);
                assert_eq!(s.count(&q).unwrap(), 0);
            }

            #[test]
            fn filters_compare_by_type() {
                let s = store();
                let q = Query::new("customers").filter("points", FilterOp::Gte, json!(20));
                assert_eq!(s.count(&q).unwrap(), 2);
                let q = Query::new("customers").filter("points", FilterOp::Eq, json!("20"));
                assert_eq!(s.count(&q).unwrap(), 0);
                let q = Query::new("customers").filter("name", FilterOp::Like, json!("g%"));
                assert_eq!(s.count(&q).unwrap(), 1);
                let q = Query::new("customers").filter("id", FilterOp::In, json!([1, 3, 5]));
                assert_eq!(s.count(&q).unwrap(), 2);
                let q = Query::new("customers").filter("name", FilterOp::Ne, json!("Ada"));
                assert_eq!(s.count(&q).unwrap(), 2);
            }

            #[test]
            fn order_then_window() {
                let s = store();
                let q = Query::new("customers")
                    .select(["name"])
                    .order_by("points", Direction::Desc)
                    .offset(1)
                    .limit(1);
                let rows = s.fetch(&q).unwrap();
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].values.get("name"), Some(&json!("Linus")));
            }

            #[test]
            fn ties_break_on_id() {
                let s = store();
                s.create("customers", fields(json!({"name": "Ada"}))).unwrap();
                let q = Query::new("customers").order_by("name", Direction::Asc).limit(2);
                let ids: Vec<i64> = s.fetch(&q).unwrap().iter().map(|r| r.id.get()).collect();
                assert_eq!(ids, vec![1, 4]);
            }

            #[test]
            fn count_ignores_window() {
                let s = store();
                let q = Query::new("customers").limit(1).offset(2);
                assert_eq!(s.count(&q).unwrap(), 3);
            }
        }
    };
}

conformance!(memory, MemoryStore::new());
conformance!(sqlite, SqliteStore::open_in_memory().unwrap());

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        seed(&store);
    }
    let store = SqliteStore::open(&path).unwrap();
    for s in schemas() {
        store.register(s).unwrap();
    }
    pretty_assertions::assert_eq!(store.all("customers").unwrap().len(), 3);
    pretty_assertions::assert_eq!(store.all("orders").unwrap().len(), 3);
}

#[test]
fn memory_store_reports_transaction_depth() {
    let store = MemoryStore::with_schemas(schemas()).unwrap();
    pretty_assertions::assert_eq!(store.depth(), 0);
    store.begin().unwrap();
    store.begin().unwrap();
    pretty_assertions::assert_eq!(store.depth(), 2);
    store.commit().unwrap();
    store.rollback().unwrap();
    pretty_assertions::assert_eq!(store.depth(), 0);
}
