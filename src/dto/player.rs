//! Player profile, preference and favorite payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::catalog::LevelView,
    state::catalog::{Category, Mode, Player},
};

/// Public projection of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            display_name: player.display_name.clone(),
            avatar_url: player.avatar_url.clone(),
        }
    }
}

/// Body of `PUT /players/me`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 40))]
    pub display_name: String,
    #[serde(default)]
    #[validate(url)]
    pub avatar_url: Option<String>,
}

/// Level of one category for the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct PreferenceView {
    pub category: Category,
    pub level: LevelView,
    /// False when no level was ever stored and the default applies.
    pub explicit: bool,
}

/// Response of `GET /preferences/{mode}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PreferencesResponse {
    pub mode: Mode,
    pub preferences: Vec<PreferenceView>,
}

/// Body of `PUT /preferences`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetPreferenceRequest {
    pub mode: Mode,
    pub category: Category,
    #[validate(range(max = 3))]
    pub level: u8,
}

/// Response of the favorites routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct FavoritesResponse {
    pub prompt_ids: Vec<Uuid>,
}
