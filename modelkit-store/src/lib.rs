//! Record storage for modelkit.
//!
//! The [`Store`] trait is the persistence contract the lens and bulk layers
//! are written against. Two implementations ship here:
//!
//! - [`MemoryStore`] keeps collections in a mutex-guarded map and implements
//!   transactions as a stack of snapshots. Used by tests and embedders.
//! - [`SqliteStore`] keeps records as JSON documents in a single SQLite table,
//!   compiling [`Query`] values to SQL with `json_extract` and correlated
//!   `COUNT(*)` subqueries for relation counts.
//!
//! Both stores give an open transaction to the thread that began it; other
//! threads wait until it commits or rolls back.

mod error;
mod memory;
mod query;
mod sqlite;
mod store;
mod txn;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query, Row, Search};
pub use sqlite::SqliteStore;
pub use store::Store;
