//! Room creation, settings, join and view payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::RoomEntity,
    dto::{
        catalog::LevelView,
        format_system_time,
        player::PlayerView,
        turn::{MatchSummaryView, TurnSnapshotView},
    },
    state::{
        catalog::{Category, Mode, Player, SessionKind},
        room::RoomStatus,
    },
};

/// Participant declared for a solo session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct FictionalPlayerInput {
    #[validate(length(min = 1, max = 30))]
    pub name: String,
    /// Level applied to every category of the mode.
    #[validate(range(min = 1, max = 3))]
    pub level: u8,
}

/// Body of `POST /rooms`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    pub mode: Mode,
    #[serde(default = "default_session_kind")]
    pub session_kind: SessionKind,
    /// Required for solo sessions, rejected for online ones.
    #[serde(default)]
    #[validate(nested)]
    pub fictional_players: Vec<FictionalPlayerInput>,
}

fn default_session_kind() -> SessionKind {
    SessionKind::Online
}

/// Body of `PUT /rooms/{code}/settings`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RoomSettingsRequest {
    /// Categories allowed in the session; a non-empty subset of the mode's categories.
    #[validate(length(min = 1))]
    pub active_categories: Vec<Category>,
    /// Text appended to penalty prompts; empty clears it.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub punishment: Option<String>,
    #[serde(default)]
    pub escalation: bool,
}

/// Solo participant as shown in the room view.
#[derive(Debug, Serialize, ToSchema)]
pub struct FictionalPlayerView {
    pub name: String,
    pub level: LevelView,
}

/// Full room projection.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomView {
    pub id: Uuid,
    pub code: String,
    pub host_id: String,
    pub mode: Mode,
    pub session_kind: SessionKind,
    pub status: RoomStatus,
    pub members: Vec<PlayerView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fictional_players: Vec<FictionalPlayerView>,
    pub active_categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punishment: Option<String>,
    pub escalation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<TurnSnapshotView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<MatchSummaryView>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl RoomView {
    /// Combine a stored room with its resolved members.
    pub fn from_parts(room: &RoomEntity, members: &[Player]) -> Self {
        Self {
            id: room.id,
            code: room.code.clone(),
            host_id: room.host_id.clone(),
            mode: room.mode,
            session_kind: room.session_kind,
            status: room.status,
            members: members.iter().map(PlayerView::from).collect(),
            fictional_players: room
                .fictional_players
                .iter()
                .map(|player| FictionalPlayerView {
                    name: player.name.clone(),
                    level: player.level.into(),
                })
                .collect(),
            active_categories: room.active_categories.clone(),
            punishment: room.punishment.clone(),
            escalation: room.escalation,
            snapshot: room.turn_snapshot.as_ref().map(TurnSnapshotView::from),
            summary: room.summary.as_ref().map(MatchSummaryView::from),
            created_at: format_system_time(room.created_at),
            ended_at: room.ended_at.map(format_system_time),
        }
    }
}

/// Where the client should navigate after joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JoinRoute {
    /// Host of a room still waiting for players.
    Lobby,
    /// Host of a running match.
    Game,
    /// Participant following the match.
    Waiting,
    /// The room has ended.
    Closed,
}

/// Response of `POST /rooms/{code}/join`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub route: JoinRoute,
    pub room: RoomView,
}
