//! Bulk and transactional mutation for modelkit models.
//!
//! [`BulkMutator`] validates items against a model's ruleset and writes them
//! through a [`Store`](modelkit_store::Store). Validation failures drop the
//! item silently. Operations that run inside a transaction (`import_data`,
//! `sync_data`, `bulk_operation_with_transaction`) roll back on any fault and
//! report `false`; the `try_*` variants return the fault instead.
//!
//! [`StatusToggle`] changes a model's status field after consulting an
//! injected [`Authorizer`], recording every attempt in an [`AuditSink`].

mod error;
mod mutator;
mod status;
mod transfer;

pub use error::{BulkError, BulkResult};
pub use mutator::{BulkMutator, UpdateFailure, UpdateReport};
pub use status::{
    AllowAll, AuditDecision, AuditEntry, AuditSink, Authorizer, MemoryAuditSink, StatusToggle,
};
pub use transfer::parse_payload;
