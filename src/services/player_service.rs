use tracing::info;

use crate::{
    dao::models::UserEntity,
    dto::player::{PlayerView, UpdateProfileRequest},
    error::ServiceError,
    state::{SharedState, catalog::Player},
};

/// Store the caller's public profile.
pub async fn update_profile(
    state: &SharedState,
    caller: &str,
    request: UpdateProfileRequest,
) -> Result<PlayerView, ServiceError> {
    let display_name = request.display_name.trim();
    if display_name.is_empty() {
        return Err(ServiceError::InvalidInput("display name cannot be blank".into()));
    }

    let user = UserEntity {
        id: caller.to_owned(),
        display_name: Some(display_name.to_owned()),
        avatar_url: request.avatar_url,
    };
    let store = state.require_store().await?;
    store.upsert_user(user.clone()).await?;

    info!(player = %caller, "profile updated");
    Ok(PlayerView::from(&Player::from(user)))
}
