//! Fallback lobby refresh.
//!
//! While a room waits for players, one poller per room re-reads the member list
//! on a fixed period and broadcasts it when it changed. It stops once nobody
//! listens or the room left the lobby.

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::{
    dao::models::RoomEntity,
    services::{room_service::load_members, sse_events},
    state::{SharedState, catalog::PlayerId, room::RoomStatus},
};

/// Start the poller of `room` unless one already runs.
pub fn spawn(state: SharedState, room: RoomEntity) {
    if !state.claim_membership_poll(room.id) {
        return;
    }

    tokio::spawn(async move {
        debug!(room = %room.code, "membership poller started");
        poll(&state, &room).await;
        state.release_membership_poll(room.id);
        debug!(room = %room.code, "membership poller stopped");
    });
}

async fn poll(state: &SharedState, room: &RoomEntity) {
    let channels = state.rooms().room(room.id);
    let mut ticker = interval(state.config().membership_poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen: Option<Vec<PlayerId>> = None;

    loop {
        ticker.tick().await;
        if channels.public().subscribers() == 0 {
            break;
        }
        let Some(store) = state.store().await else {
            continue;
        };

        let current = match store.find_room(room.id).await {
            Ok(Some(current)) => current,
            Ok(None) => break,
            Err(err) => {
                warn!(room = %room.code, error = %err, "membership poll failed");
                continue;
            }
        };
        if current.status != RoomStatus::Waiting {
            break;
        }

        let members = match load_members(store.as_ref(), &current).await {
            Ok(members) => members,
            Err(err) => {
                warn!(room = %room.code, error = %err, "membership poll failed");
                continue;
            }
        };
        let ids = members.iter().map(|player| player.id.clone()).collect::<Vec<_>>();
        if membership_changed(last_seen.as_deref(), &ids) {
            sse_events::broadcast_members(&channels, &members);
        }
        last_seen = Some(ids);
    }
}

/// The first read is the baseline; later reads count only when the list differs.
fn membership_changed(previous: Option<&[PlayerId]>, current: &[PlayerId]) -> bool {
    previous.is_some_and(|previous| previous != current)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dto::room::CreateRoomRequest,
        services::room_service,
        state::{
            AppState,
            catalog::{Mode, SessionKind},
        },
    };

    #[test]
    fn baseline_is_not_a_change() {
        let ana = vec!["ana".to_string()];
        let both = vec!["ana".to_string(), "bia".to_string()];

        assert!(!membership_changed(None, &both));
        assert!(!membership_changed(Some(both.as_slice()), &both));
        assert!(membership_changed(Some(ana.as_slice()), &both));
    }

    #[tokio::test]
    async fn poller_stops_without_listeners() {
        let state = AppState::with_memory_store().await;
        let view = room_service::create_room(
            &state,
            "ana",
            CreateRoomRequest {
                mode: Mode::Group,
                session_kind: SessionKind::Online,
                fictional_players: Vec::new(),
            },
        )
        .await
        .unwrap();
        let store = state.require_store().await.unwrap();
        let room = store.find_room(view.id).await.unwrap().unwrap();

        spawn(state.clone(), room);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !state.claim_membership_poll(view.id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller released its slot");
    }
}
