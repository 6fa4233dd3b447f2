//! Lens: ad-hoc projection, relation counts, search/filter/sort and
//! pagination driven by request parameters.
//!
//! A request names the fields it wants (`lens_fields`). Names that are
//! columns of the target collection are projected; every other name must be a
//! relation the collection declares, and is returned as a row count aliased to
//! the relation's name. Unknown relations are a configuration fault, raised
//! before any query runs.
//!
//! The shaped query then passes through a [`QueryPipeline`] (search, filter,
//! sort, in that order) and is executed with one of three pagination
//! strategies. [`pagination`] normalizes the resulting [`Page`] into the wire
//! `meta`/`links` shape.

mod cursor;
mod error;
mod lens;
mod pipeline;
mod request;
mod spec;

pub mod pagination;

pub use cursor::Cursor;
pub use error::{LensError, LensResult};
pub use lens::Lens;
pub use pagination::{
    CursorPage, LengthAwarePage, Page, PageEnvelope, PaginationLinks, PaginationMeta, SimplePage,
};
pub use pipeline::{PassthroughPipeline, QueryPipeline, RequestPipeline};
pub use request::{LensConfig, LensRequest, PaginationStrategy};
pub use spec::LensSpec;
