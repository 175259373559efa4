use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        catalog::CatalogResponse,
        prompts::{CacheStatsResponse, ImportPromptsRequest, ImportPromptsResponse},
    },
    error::AppError,
    services::{catalog_service, prompt_service},
    state::SharedState,
};

/// Static catalog and prompt maintenance routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/catalog", get(catalog))
        .route("/prompts/import", post(import_prompts))
        .route("/prompts/cache", get(cache_stats))
        .route("/prompts/cache", delete(clear_cache))
}

/// Modes with their categories and headcounts, plus the intensity levels.
#[utoipa::path(
    get,
    path = "/catalog",
    tag = "catalog",
    responses((status = 200, description = "Static catalog", body = CatalogResponse))
)]
pub async fn catalog() -> Json<CatalogResponse> {
    Json(catalog_service::catalog())
}

/// Bulk-load prompt rows.
#[utoipa::path(
    post,
    path = "/prompts/import",
    tag = "catalog",
    request_body = ImportPromptsRequest,
    responses(
        (status = 200, description = "Rows stored", body = ImportPromptsResponse),
        (status = 400, description = "A row is invalid; nothing was stored")
    )
)]
pub async fn import_prompts(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ImportPromptsRequest>>,
) -> Result<Json<ImportPromptsResponse>, AppError> {
    Ok(Json(prompt_service::import(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/prompts/cache",
    tag = "catalog",
    responses((status = 200, description = "Offline cache contents", body = CacheStatsResponse))
)]
pub async fn cache_stats(State(state): State<SharedState>) -> Json<CacheStatsResponse> {
    Json(prompt_service::cache_stats(&state))
}

#[utoipa::path(
    delete,
    path = "/prompts/cache",
    tag = "catalog",
    responses((status = 200, description = "Cache emptied", body = CacheStatsResponse))
)]
pub async fn clear_cache(State(state): State<SharedState>) -> Json<CacheStatsResponse> {
    Json(prompt_service::clear_cache(&state))
}
