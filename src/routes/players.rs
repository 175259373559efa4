use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::player::{
        FavoritesResponse, PlayerView, PreferenceView, PreferencesResponse, SetPreferenceRequest,
        UpdateProfileRequest,
    },
    error::AppError,
    routes::caller::Caller,
    services::{favorite_service, player_service, preference_service},
    state::{SharedState, catalog::Mode},
};

/// Per-identity routes: profile, intensity preferences and favorites.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/me", put(update_profile))
        .route("/preferences", put(set_preference))
        .route("/preferences/{mode}", get(list_preferences))
        .route("/favorites", get(list_favorites))
        .route(
            "/favorites/{prompt_id}",
            put(add_favorite).delete(remove_favorite),
        )
}

#[utoipa::path(
    put,
    path = "/players/me",
    tag = "players",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile stored", body = PlayerView))
)]
pub async fn update_profile(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<UpdateProfileRequest>>,
) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(
        player_service::update_profile(&state, &caller, payload).await?,
    ))
}

/// Every category of a mode with the caller's level; unset categories read as Light.
#[utoipa::path(
    get,
    path = "/preferences/{mode}",
    tag = "players",
    params(("mode" = Mode, Path, description = "Game mode")),
    responses((status = 200, description = "Effective levels", body = PreferencesResponse))
)]
pub async fn list_preferences(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(mode): Path<Mode>,
) -> Result<Json<PreferencesResponse>, AppError> {
    Ok(Json(preference_service::list(&state, &caller, mode).await?))
}

#[utoipa::path(
    put,
    path = "/preferences",
    tag = "players",
    request_body = SetPreferenceRequest,
    responses(
        (status = 200, description = "Level stored", body = PreferenceView),
        (status = 400, description = "Category outside the mode")
    )
)]
pub async fn set_preference(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<SetPreferenceRequest>>,
) -> Result<Json<PreferenceView>, AppError> {
    Ok(Json(preference_service::set(&state, &caller, payload).await?))
}

#[utoipa::path(
    get,
    path = "/favorites",
    tag = "players",
    responses((status = 200, description = "Favorite prompts", body = FavoritesResponse))
)]
pub async fn list_favorites(
    State(state): State<SharedState>,
    Caller(caller): Caller,
) -> Result<Json<FavoritesResponse>, AppError> {
    Ok(Json(favorite_service::list(&state, &caller).await?))
}

#[utoipa::path(
    put,
    path = "/favorites/{prompt_id}",
    tag = "players",
    params(("prompt_id" = Uuid, Path, description = "Prompt to mark")),
    responses(
        (status = 200, description = "Favorite stored", body = FavoritesResponse),
        (status = 404, description = "Unknown prompt")
    )
)]
pub async fn add_favorite(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(prompt_id): Path<Uuid>,
) -> Result<Json<FavoritesResponse>, AppError> {
    Ok(Json(favorite_service::add(&state, &caller, prompt_id).await?))
}

#[utoipa::path(
    delete,
    path = "/favorites/{prompt_id}",
    tag = "players",
    params(("prompt_id" = Uuid, Path, description = "Prompt to unmark")),
    responses((status = 200, description = "Favorite removed", body = FavoritesResponse))
)]
pub async fn remove_favorite(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(prompt_id): Path<Uuid>,
) -> Result<Json<FavoritesResponse>, AppError> {
    Ok(Json(
        favorite_service::remove(&state, &caller, prompt_id).await?,
    ))
}
