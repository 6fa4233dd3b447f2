use crate::cursor::Cursor;
use crate::error::{LensError, LensResult};
use crate::pagination::{self, Page};
use crate::pipeline::{PassthroughPipeline, QueryPipeline};
use crate::request::{LensConfig, LensRequest, PaginationStrategy};
use crate::spec::LensSpec;
use modelkit_model::Model;
use modelkit_store::{Query, Store};
use tracing::debug;

/// Request-driven query over one model's collection.
///
/// ```ignore
/// let page = Lens::new(&store)
///     .model(&products)
///     .pipeline(RequestPipeline::new(products.schema()))
///     .run(&request)?;
/// ```
pub struct Lens<'a, S: Store + ?Sized> {
    store: &'a S,
    model: Option<&'a Model>,
    pipeline: Box<dyn QueryPipeline + 'a>,
    config: LensConfig,
}

impl<'a, S: Store + ?Sized> Lens<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            model: None,
            pipeline: Box::new(PassthroughPipeline),
            config: LensConfig::default(),
        }
    }

    pub fn model(mut self, model: &'a Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn pipeline(mut self, pipeline: impl QueryPipeline + 'a) -> Self {
        self.pipeline = Box::new(pipeline);
        self
    }

    pub fn config(mut self, config: LensConfig) -> Self {
        self.config = config;
        self
    }

    fn target(&self) -> LensResult<&'a Model> {
        self.model.ok_or(LensError::MissingModel)
    }

    /// Splits `lens_fields` into projected columns and counted relations.
    pub fn resolve(&self, request: &LensRequest) -> LensResult<LensSpec> {
        let collection = self.target()?.name();
        let known = self.store.known_columns(collection)?;
        LensSpec::resolve(collection, &request.lens_fields, &known, |name| {
            self.store.has_capability(collection, name)
        })
    }

    /// The fully shaped query, before pagination.
    pub fn build_query(&self, request: &LensRequest) -> LensResult<Query> {
        let spec = self.resolve(request)?;
        let mut query = Query::new(self.target()?.name()).select(spec.fields);
        for relation in spec.relations {
            query = query.with_count(relation);
        }
        let query = self.pipeline.search(query, request);
        let query = self.pipeline.filter(query, request);
        Ok(self.pipeline.sort(query, request))
    }

    /// Shapes, paginates and executes the request.
    ///
    /// Configuration faults (missing model, undeclared relation, unknown
    /// pagination strategy, malformed cursor) surface before the store is
    /// queried.
    pub fn run(&self, request: &LensRequest) -> LensResult<Page> {
        let strategy = request.strategy()?;
        let cursor = match (strategy, request.cursor.as_deref()) {
            (PaginationStrategy::Cursor, Some(token)) => Some(Cursor::decode(token)?),
            _ => None,
        };
        let query = self.build_query(request)?;
        let per_page = request.resolved_per_page(&self.config);

        debug!(
            collection = %query.collection,
            select = ?query.select,
            counts = ?query.counts,
            filters = query.filters.len(),
            strategy = strategy.as_str(),
            per_page,
            "lens query"
        );

        match strategy {
            PaginationStrategy::Full => pagination::paginate(
                self.store,
                query,
                per_page,
                request.resolved_page(),
                &request.path,
            ),
            PaginationStrategy::Simple => pagination::simple_paginate(
                self.store,
                query,
                per_page,
                request.resolved_page(),
                &request.path,
            ),
            PaginationStrategy::Cursor => pagination::cursor_paginate(
                self.store,
                query,
                per_page,
                cursor,
                &request.path,
                &self.config.cursor_name,
            ),
        }
    }
}
