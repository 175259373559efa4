use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::RoomEntity,
    dto::{
        player::PlayerView,
        sse::{
            HANDSHAKE, Handshake, LEVEL_UP, LevelUpEvent, REACTION, ROOM_MEMBERS, ROOM_SNAPSHOT,
            ROOM_STATUS, RoomMembersEvent, RoomStatusEvent, SYSTEM_STATUS, ServerEvent,
            SystemStatus, TURN_NOTICE, TurnNoticeEvent,
        },
        turn::{MatchSummaryView, TurnSnapshotView},
        ws::ReactionView,
    },
    state::{
        RoomChannels,
        catalog::{IntensityLevel, Player},
        session::TurnSnapshot,
    },
};

/// Message shown to the host when a round was skipped for lack of a prompt.
pub const NO_PROMPT_NOTICE: &str = "No compatible prompt found; skipping to the next round.";

/// Event replacing the observers' turn projection.
pub fn snapshot_event(snapshot: &TurnSnapshot) -> Option<ServerEvent> {
    encode(ROOM_SNAPSHOT, &TurnSnapshotView::from(snapshot))
}

/// Event announcing the room's status, with the summary once it ended.
pub fn status_event(room: &RoomEntity) -> Option<ServerEvent> {
    let payload = RoomStatusEvent {
        status: room.status,
        summary: room.summary.as_ref().map(MatchSummaryView::from),
    };
    encode(ROOM_STATUS, &payload)
}

/// Event carrying the full member list.
pub fn members_event(members: &[Player]) -> Option<ServerEvent> {
    let payload = RoomMembersEvent {
        members: members.iter().map(PlayerView::from).collect(),
    };
    encode(ROOM_MEMBERS, &payload)
}

/// First event of a room stream.
pub fn handshake_event(code: &str, host: bool, degraded: bool) -> Option<ServerEvent> {
    let payload = Handshake {
        room: code.to_string(),
        host,
        degraded,
    };
    encode(HANDSHAKE, &payload)
}

/// Storage availability change.
pub fn system_status_event(degraded: bool) -> Option<ServerEvent> {
    encode(SYSTEM_STATUS, &SystemStatus { degraded })
}

/// Broadcast the member list to every participant of the room.
pub fn broadcast_members(channels: &RoomChannels, members: &[Player]) {
    if let Some(event) = members_event(members) {
        channels.public().broadcast(event);
    }
}

/// Relay a reaction to every participant of the room.
pub fn broadcast_reaction(channels: &RoomChannels, reaction: &ReactionView) {
    if let Some(event) = encode(REACTION, reaction) {
        channels.public().broadcast(event);
    }
}

/// Tell the host the round was skipped because nothing compatible was found.
pub fn notify_no_prompt(channels: &RoomChannels, round: u32) {
    let payload = TurnNoticeEvent {
        round,
        message: NO_PROMPT_NOTICE.to_string(),
    };
    if let Some(event) = encode(TURN_NOTICE, &payload) {
        channels.host().broadcast(event);
    }
}

/// Tell the host the escalation cap rose.
pub fn notify_level_up(channels: &RoomChannels, round: u32, level: IntensityLevel) {
    let payload = LevelUpEvent {
        round,
        level: level.into(),
    };
    if let Some(event) = encode(LEVEL_UP, &payload) {
        channels.host().broadcast(event);
    }
}

fn encode(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}
