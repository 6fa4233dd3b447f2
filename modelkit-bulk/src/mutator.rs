use crate::error::{BulkError, BulkResult};
use modelkit_model::{Fields, Model, Record, RecordId, Violation};
use modelkit_store::Store;
use tracing::{debug, info, warn};

/// Why one item of a bulk update did not apply.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateFailure {
    /// The item carried no usable `id`.
    MissingId,
    /// No record with that id exists.
    NotFound(RecordId),
    /// The item failed the model's ruleset.
    Invalid(RecordId, Vec<Violation>),
    /// The store reported the update as not applied, or faulted.
    Rejected(RecordId),
}

/// Per-item outcome of [`BulkMutator::bulk_update_report`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub updated: Vec<RecordId>,
    /// `(item index, reason)` for every item that did not apply.
    pub failures: Vec<(usize, UpdateFailure)>,
}

impl UpdateReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rolls back on drop unless disarmed, so a failing or panicking operation
/// never leaves its transaction open.
struct OpenTransaction<'a, S: Store + ?Sized> {
    store: &'a S,
    collection: &'a str,
    armed: bool,
}

impl<S: Store + ?Sized> Drop for OpenTransaction<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.store.rollback() {
                warn!("{}: rollback failed: {e}", self.collection);
            }
        }
    }
}

/// Batch mutations over one model's collection.
///
/// `bulk_create`, `bulk_update` and `bulk_delete` issue one store call per
/// item (or batch) with no transaction around them. `import_data`,
/// `sync_data` and anything run through
/// [`bulk_operation_with_transaction`](Self::bulk_operation_with_transaction)
/// are all-or-nothing.
pub struct BulkMutator<'a, S: Store + ?Sized> {
    store: &'a S,
    model: &'a Model,
}

impl<'a, S: Store + ?Sized> BulkMutator<'a, S> {
    pub fn new(store: &'a S, model: &'a Model) -> Self {
        Self { store, model }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    fn collection(&self) -> &'a str {
        self.model.name()
    }

    /// Creates every item that passes validation, in input order.
    ///
    /// Invalid items are skipped without error.
    pub fn bulk_create(&self, items: &[Fields]) -> BulkResult<Vec<Record>> {
        let mut created = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if !self.model.validate(item) {
                debug!("{}: skipping invalid item #{index}", self.collection());
                continue;
            }
            created.push(self.store.create(self.collection(), item.clone())?);
        }
        Ok(created)
    }

    /// Applies each item to the record its `id` names.
    ///
    /// Returns `false` when any item lacks an id, targets a missing record,
    /// fails validation, or is not applied by the store. Items before and
    /// after a failure are still applied.
    pub fn bulk_update(&self, items: &[Fields]) -> bool {
        self.bulk_update_report(items).is_success()
    }

    /// [`bulk_update`](Self::bulk_update) with the per-item outcome.
    pub fn bulk_update_report(&self, items: &[Fields]) -> UpdateReport {
        let mut report = UpdateReport::default();
        for (index, item) in items.iter().enumerate() {
            match self.update_one(item) {
                Ok(id) => report.updated.push(id),
                Err(failure) => {
                    debug!("{}: update item #{index} failed: {failure:?}", self.collection());
                    report.failures.push((index, failure));
                }
            }
        }
        report
    }

    fn update_one(&self, item: &Fields) -> Result<RecordId, UpdateFailure> {
        let id = item
            .get("id")
            .and_then(RecordId::from_value)
            .ok_or(UpdateFailure::MissingId)?;
        let record = match self.store.find(self.collection(), id) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(UpdateFailure::NotFound(id)),
            Err(e) => {
                warn!("{}: lookup of {id} failed: {e}", self.collection());
                return Err(UpdateFailure::Rejected(id));
            }
        };
        if !self.model.validate(item) {
            return Err(UpdateFailure::Invalid(id, self.model.violations(item)));
        }
        let mut changes = item.clone();
        changes.remove("id");
        match self.store.update(&record, changes) {
            Ok(true) => Ok(id),
            Ok(false) => Err(UpdateFailure::Rejected(id)),
            Err(e) => {
                warn!("{}: update of {id} failed: {e}", self.collection());
                Err(UpdateFailure::Rejected(id))
            }
        }
    }

    /// Deletes the given ids in one call; `true` iff at least one row went.
    pub fn bulk_delete(&self, ids: &[RecordId]) -> BulkResult<bool> {
        Ok(self.store.delete_where(self.collection(), ids)? > 0)
    }

    /// Runs `op` inside a transaction.
    ///
    /// `Ok(true)` commits. `Ok(false)` and errors roll back; errors are
    /// logged and reported as `false`.
    pub fn bulk_operation_with_transaction<F>(&self, op: F) -> bool
    where
        F: FnOnce(&Self) -> BulkResult<bool>,
    {
        match self.try_transaction(op) {
            Ok(committed) => committed,
            Err(e) => {
                warn!("{}: transaction rolled back: {e}", self.collection());
                false
            }
        }
    }

    /// [`bulk_operation_with_transaction`](Self::bulk_operation_with_transaction)
    /// that hands the fault back instead of swallowing it.
    ///
    /// The whole transaction runs on the calling thread; other threads using
    /// the same store wait until it commits or rolls back.
    pub fn try_transaction<F>(&self, op: F) -> BulkResult<bool>
    where
        F: FnOnce(&Self) -> BulkResult<bool>,
    {
        self.store.begin()?;
        let mut open = OpenTransaction {
            store: self.store,
            collection: self.collection(),
            armed: true,
        };
        let committed = op(self)?;
        open.armed = false;
        if committed {
            self.store.commit()?;
        } else {
            self.store.rollback()?;
            debug!("{}: operation declined, rolled back", self.collection());
        }
        Ok(committed)
    }

    fn create_valid(&self, items: &[Fields]) -> BulkResult<usize> {
        Ok(self.bulk_create(items)?.len())
    }

    /// Validates and creates `items` atomically; invalid items are dropped.
    pub fn import_data(&self, items: &[Fields]) -> bool {
        self.bulk_operation_with_transaction(|m| {
            let created = m.create_valid(items)?;
            info!("{}: imported {created} of {} items", m.collection(), items.len());
            Ok(true)
        })
    }

    /// Every record, through the model's export hook when it has one.
    pub fn export_data(&self) -> BulkResult<Vec<Fields>> {
        let records = self.store.all(self.collection())?;
        info!("{}: exporting {} records", self.collection(), records.len());
        Ok(records.iter().map(|r| self.model.export(r)).collect())
    }

    /// Replaces the collection's contents with `items` in one transaction.
    pub fn sync_data(&self, items: &[Fields]) -> bool {
        self.bulk_operation_with_transaction(|m| {
            m.store.truncate(m.collection())?;
            let created = m.create_valid(items)?;
            info!("{}: synced {created} of {} items", m.collection(), items.len());
            Ok(true)
        })
    }

    /// Like [`import_data`](Self::import_data), surfacing the fault.
    pub fn try_import_data(&self, items: &[Fields]) -> BulkResult<usize> {
        let mut created = 0;
        self.try_transaction(|m| {
            created = m.create_valid(items)?;
            Ok(true)
        })?;
        Ok(created)
    }

    pub(crate) fn not_found(&self, id: RecordId) -> BulkError {
        BulkError::NotFound {
            collection: self.collection().to_string(),
            id,
        }
    }
}
