use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{catalog::LevelView, player::PlayerView, turn::MatchSummaryView},
    state::room::RoomStatus,
};

/// Replacement turn snapshot, sent after every committed transition.
pub const ROOM_SNAPSHOT: &str = "room.snapshot";
/// Room lifecycle change.
pub const ROOM_STATUS: &str = "room.status";
/// Full member list, sent when it changed.
pub const ROOM_MEMBERS: &str = "room.members";
/// Ephemeral emoji reaction.
pub const REACTION: &str = "reaction";
/// Host-only notice that a round was skipped.
pub const TURN_NOTICE: &str = "turn.notice";
/// Host-only notice that the escalation cap rose.
pub const LEVEL_UP: &str = "escalation.level_up";
/// First event of every stream.
pub const HANDSHAKE: &str = "handshake";
/// Storage availability change.
pub const SYSTEM_STATUS: &str = "system.status";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Code of the followed room.
    pub room: String,
    /// Whether this stream also carries host-only notices.
    pub host: bool,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the room status changes. Observers leave the match on `ended`.
pub struct RoomStatusEvent {
    pub status: RoomStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<MatchSummaryView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Current members of the room.
pub struct RoomMembersEvent {
    pub members: Vec<PlayerView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Host-only: no compatible prompt was found and the round moved on.
pub struct TurnNoticeEvent {
    pub round: u32,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Host-only: the escalation cap rose with this round.
pub struct LevelUpEvent {
    pub round: u32,
    pub level: LevelView,
}
