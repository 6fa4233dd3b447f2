//! Authorized, audited status changes.
//!
//! The authorizer and audit sink are passed in by the caller; nothing here
//! reaches for ambient state.

use crate::error::{BulkError, BulkResult};
use crate::mutator::BulkMutator;
use chrono::{DateTime, Utc};
use modelkit_model::{Fields, Model, Record, RecordId};
use modelkit_store::Store;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info};

/// Decides whether an actor may change a record's status.
pub trait Authorizer: Send + Sync {
    fn can_change_status(&self, actor: &str, model: &Model, record: &Record) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&str, &Model, &Record) -> bool + Send + Sync,
{
    fn can_change_status(&self, actor: &str, model: &Model, record: &Record) -> bool {
        self(actor, model, record)
    }
}

/// Permits every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_change_status(&self, _: &str, _: &Model, _: &Record) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Allowed,
    Denied,
}

/// One attempted status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor: String,
    pub collection: String,
    pub record: RecordId,
    pub old_status: Value,
    pub new_status: Value,
    pub decision: AuditDecision,
    pub timestamp: DateTime<Utc>,
}

/// Receives audit entries for status changes, allowed or not.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> BulkResult<()>;
}

/// Keeps audit entries in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> BulkResult<()> {
        self.entries
            .lock()
            .map_err(|_| BulkError::Audit("audit log lock poisoned".into()))?
            .push(entry);
        Ok(())
    }
}

/// Status field interpretation: `true`, non-zero numbers, and the strings
/// `"1"`/`"true"` are on; everything else, including absence, is off.
fn is_on(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

/// The flipped status, in the same representation as the old one.
fn flipped(old: &Value) -> Value {
    let on = !is_on(old);
    match old {
        Value::Number(_) => Value::from(i64::from(on)),
        Value::String(_) => Value::String(if on { "1" } else { "0" }.into()),
        _ => Value::Bool(on),
    }
}

/// Status changes on top of a [`BulkMutator`].
pub struct StatusToggle<'a, S: Store + ?Sized> {
    mutator: BulkMutator<'a, S>,
    authorizer: &'a dyn Authorizer,
    audit: &'a dyn AuditSink,
}

impl<'a, S: Store + ?Sized> StatusToggle<'a, S> {
    pub fn new(
        mutator: BulkMutator<'a, S>,
        authorizer: &'a dyn Authorizer,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self {
            mutator,
            authorizer,
            audit,
        }
    }

    /// Flips the model's status field on record `id`.
    pub fn toggle_status(&self, id: RecordId, actor: &str) -> BulkResult<Record> {
        let record = self.load(id)?;
        let old = self.current(&record);
        let new = flipped(&old);
        self.apply(record, old, new, actor)
    }

    /// Sets the model's status field on record `id` to `status`.
    pub fn set_status(&self, id: RecordId, status: Value, actor: &str) -> BulkResult<Record> {
        let record = self.load(id)?;
        let old = self.current(&record);
        self.apply(record, old, status, actor)
    }

    fn load(&self, id: RecordId) -> BulkResult<Record> {
        let model = self.mutator.model();
        self.mutator
            .store()
            .find(model.name(), id)?
            .ok_or_else(|| self.mutator.not_found(id))
    }

    fn current(&self, record: &Record) -> Value {
        record
            .get(self.mutator.model().status_field())
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn apply(&self, mut record: Record, old: Value, new: Value, actor: &str) -> BulkResult<Record> {
        let model = self.mutator.model();
        let allowed = self.authorizer.can_change_status(actor, model, &record);
        self.audit.record(AuditEntry {
            actor: actor.to_string(),
            collection: model.name().to_string(),
            record: record.id,
            old_status: old.clone(),
            new_status: new.clone(),
            decision: if allowed {
                AuditDecision::Allowed
            } else {
                AuditDecision::Denied
            },
            timestamp: Utc::now(),
        })?;

        if !allowed {
            debug!("{}: status change on {} denied for `{actor}`", model.name(), record.id);
            return Err(BulkError::Unauthorized {
                actor: actor.to_string(),
                collection: model.name().to_string(),
                id: record.id,
            });
        }

        let field = model.status_field().to_string();
        let mut changes = Fields::new();
        changes.insert(field.clone(), new.clone());
        if !self.mutator.store().update(&record, changes)? {
            return Err(self.mutator.not_found(record.id));
        }
        info!("{}: {} status {old} -> {new} by `{actor}`", model.name(), record.id);
        record.fields.insert(field, new);
        Ok(record)
    }
}
