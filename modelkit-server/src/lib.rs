//! HTTP API for modelkit.
//!
//! Every model in the registry gets the same set of routes under
//! `/api/v1/{model}`: a lens listing, export/import/sync, and bulk
//! create/update/delete.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use modelkit_blobstore::BlobStore;
use modelkit_bulk::{BulkError, BulkMutator, parse_payload};
use modelkit_lens::{Lens, LensConfig, LensError, LensRequest, PageEnvelope, RequestPipeline};
use modelkit_model::{Fields, Model, ModelRegistry, RecordId};
use modelkit_store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared state behind every route.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub models: ModelRegistry,
    pub blobs: Arc<dyn BlobStore>,
    pub lens: LensConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, models: ModelRegistry, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            models,
            blobs,
            lens: LensConfig::default(),
        }
    }

    fn model(&self, name: &str) -> Result<&Model, ApiError> {
        self.models
            .get(name)
            .ok_or_else(|| ApiError::UnknownModel(name.to_string()))
    }

    fn mutator<'a>(&'a self, model: &'a Model) -> BulkMutator<'a, dyn Store> {
        BulkMutator::new(self.store.as_ref(), model)
    }
}

/// `{ "success": bool }` body returned by boolean operations.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Deserialize, Debug)]
pub struct DeleteRequest {
    pub ids: Vec<RecordId>,
}

#[derive(Deserialize, Debug)]
pub struct FileRequest {
    pub path: String,
}

/// Route failures, rendered as `{ "error": message }`.
#[derive(Debug)]
pub enum ApiError {
    UnknownModel(String),
    Lens(LensError),
    Bulk(BulkError),
    BadRequest(String),
    /// The blocking task running the request panicked or was cancelled.
    Internal(String),
}

impl From<LensError> for ApiError {
    fn from(e: LensError) -> Self {
        ApiError::Lens(e)
    }
}

impl From<BulkError> for ApiError {
    fn from(e: BulkError) -> Self {
        ApiError::Bulk(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownModel(name) => (StatusCode::NOT_FOUND, format!("unknown model: {name}")),
            ApiError::Lens(e) if e.is_configuration_fault() => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Lens(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Bulk(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        if status.is_server_error() {
            warn!("{status}: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type SharedState = State<Arc<AppState>>;

/// Runs store work on the blocking pool.
///
/// Stores hand an open transaction to the thread that began it, so each
/// request's work stays on one pool thread from start to finish.
async fn blocking<T, F>(state: Arc<AppState>, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
}

async fn lens_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PageEnvelope>, ApiError> {
    let path = uri.path().to_string();
    blocking(state, move |state| {
        let model = state.model(&model)?;
        let request = LensRequest::from_params(&path, params);
        let page = Lens::new(state.store.as_ref())
            .model(model)
            .pipeline(RequestPipeline::new(model.schema()))
            .config(state.lens.clone())
            .run(&request)?;
        Ok(Json(PageEnvelope::from(page)))
    })
    .await
}

async fn export_handler(
    State(state): SharedState,
    Path(model): Path<String>,
) -> Result<Json<Vec<Fields>>, ApiError> {
    blocking(state, move |state| {
        let model = state.model(&model)?;
        Ok(Json(state.mutator(model).export_data()?))
    })
    .await
}

/// Malformed bodies are a soft failure, reported as `success: false`.
fn items_or_none(body: &Bytes) -> Option<Vec<Fields>> {
    match parse_payload(body) {
        Ok(items) => Some(items),
        Err(e) => {
            debug!("rejected payload: {e}");
            None
        }
    }
}

async fn import_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    blocking(state, move |state| {
        let model = state.model(&model)?;
        let success =
            items_or_none(&body).is_some_and(|items| state.mutator(model).import_data(&items));
        Ok(Json(SuccessResponse { success }))
    })
    .await
}

async fn sync_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    blocking(state, move |state| {
        let model = state.model(&model)?;
        let success =
            items_or_none(&body).is_some_and(|items| state.mutator(model).sync_data(&items));
        Ok(Json(SuccessResponse { success }))
    })
    .await
}

async fn import_file_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    Json(file): Json<FileRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    blocking(state, move |state| {
        let model = state.model(&model)?;
        let success = state
            .mutator(model)
            .import_from_file(state.blobs.as_ref(), &file.path);
        Ok(Json(SuccessResponse { success }))
    })
    .await
}

async fn export_file_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    Json(file): Json<FileRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    blocking(state, move |state| {
        let model = state.model(&model)?;
        let success = state
            .mutator(model)
            .export_to_file(state.blobs.as_ref(), &file.path);
        Ok(Json(SuccessResponse { success }))
    })
    .await
}

async fn bulk_create_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<Fields>>), ApiError> {
    state.model(&model)?;
    let items = parse_payload(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    blocking(state, move |state| {
        let model = state.model(&model)?;
        let created = state.mutator(model).bulk_create(&items)?;
        Ok((
            StatusCode::CREATED,
            Json(created.iter().map(|r| r.to_fields()).collect()),
        ))
    })
    .await
}

async fn bulk_update_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.model(&model)?;
    let items = parse_payload(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    blocking(state, move |state| {
        let model = state.model(&model)?;
        Ok(Json(SuccessResponse {
            success: state.mutator(model).bulk_update(&items),
        }))
    })
    .await
}

async fn bulk_delete_handler(
    State(state): SharedState,
    Path(model): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.model(&model)?;
    let request: DeleteRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    blocking(state, move |state| {
        let model = state.model(&model)?;
        Ok(Json(SuccessResponse {
            success: state.mutator(model).bulk_delete(&request.ids)?,
        }))
    })
    .await
}

async fn models_handler(State(state): SharedState) -> Json<Value> {
    let names: Vec<&str> = state.models.models().map(Model::name).collect();
    Json(json!({ "models": names }))
}

/// Build the HTTP API router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/models", get(models_handler))
        .route("/api/v1/{model}", get(lens_handler))
        .route("/api/v1/{model}/export", get(export_handler))
        .route("/api/v1/{model}/import", post(import_handler))
        .route("/api/v1/{model}/sync", post(sync_handler))
        .route("/api/v1/{model}/import-file", post(import_file_handler))
        .route("/api/v1/{model}/export-file", post(export_file_handler))
        .route(
            "/api/v1/{model}/bulk",
            post(bulk_create_handler)
                .patch(bulk_update_handler)
                .delete(bulk_delete_handler),
        )
        .with_state(state)
}
