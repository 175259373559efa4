use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::FavoriteEntity,
    dto::player::FavoritesResponse,
    error::ServiceError,
    state::SharedState,
};

/// Prompts the caller marked as favorite.
pub async fn list(state: &SharedState, caller: &str) -> Result<FavoritesResponse, ServiceError> {
    let store = state.require_store().await?;
    let rows = store.list_favorites(vec![caller.to_owned()]).await?;
    Ok(FavoritesResponse {
        prompt_ids: rows.into_iter().map(|row| row.prompt_id).collect(),
    })
}

/// Mark a prompt as favorite. Marking twice is harmless.
pub async fn add(
    state: &SharedState,
    caller: &str,
    prompt_id: Uuid,
) -> Result<FavoritesResponse, ServiceError> {
    let store = state.require_store().await?;
    if !store.prompt_exists(prompt_id).await? {
        return Err(ServiceError::NotFound(format!("prompt `{prompt_id}` not found")));
    }

    store
        .set_favorite(FavoriteEntity {
            player_id: caller.to_owned(),
            prompt_id,
        })
        .await?;
    info!(player = %caller, %prompt_id, "favorite added");
    list(state, caller).await
}

/// Remove a favorite marking. Removing an unknown marking is harmless.
pub async fn remove(
    state: &SharedState,
    caller: &str,
    prompt_id: Uuid,
) -> Result<FavoritesResponse, ServiceError> {
    let store = state.require_store().await?;
    let removed = store
        .remove_favorite(FavoriteEntity {
            player_id: caller.to_owned(),
            prompt_id,
        })
        .await?;
    if removed {
        info!(player = %caller, %prompt_id, "favorite removed");
    }
    list(state, caller).await
}
