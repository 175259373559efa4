use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dao::{change_feed::RecordChange, models::RoomEntity},
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{
        membership_watch,
        replication::{ObserverProjection, ProjectionUpdate},
        room_service::{find_room, load_members},
        sse_events,
    },
    state::{SharedState, room::RoomStatus},
};

/// Everything a room stream listens to, captured when the client connects.
pub struct RoomSubscription {
    room: RoomEntity,
    initial: Vec<ServerEvent>,
    projection: ObserverProjection,
    changes: broadcast::Receiver<RecordChange>,
    public: Option<broadcast::Receiver<ServerEvent>>,
    host: Option<broadcast::Receiver<ServerEvent>>,
    degraded: watch::Receiver<bool>,
}

impl RoomSubscription {
    /// Whether the stream also carries host-only notices.
    pub fn is_host(&self) -> bool {
        self.host.is_some()
    }
}

/// Subscribe to a room's changes and build the events that open the stream.
///
/// Subscriptions are taken before the room is read so no committed change falls in between;
/// anything seen twice is dropped by the projection.
pub async fn subscribe_room(
    state: &SharedState,
    code: &str,
    caller: Option<&str>,
) -> Result<RoomSubscription, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;

    let changes = state.changes().subscribe(room.id);
    let channels = state.rooms().room(room.id);
    let public = Some(channels.public().subscribe());
    let is_host = caller == Some(room.host_id.as_str());
    let host = is_host.then(|| channels.host().subscribe());
    let degraded = state.degraded_watcher();

    let room = store.find_room(room.id).await?.unwrap_or(room);
    let members = load_members(store.as_ref(), &room).await?;

    let mut initial = Vec::with_capacity(4);
    initial.extend(sse_events::handshake_event(&room.code, is_host, *degraded.borrow()));
    initial.extend(sse_events::status_event(&room));
    initial.extend(sse_events::members_event(&members));
    if let Some(snapshot) = &room.turn_snapshot {
        initial.extend(sse_events::snapshot_event(snapshot));
    }

    Ok(RoomSubscription {
        projection: ObserverProjection::seeded(&room),
        room,
        initial,
        changes,
        public,
        host,
        degraded,
    })
}

/// Turn a room subscription into an SSE response.
///
/// Lobby streams also start the fallback membership poller.
pub fn to_sse_stream(
    state: SharedState,
    subscription: RoomSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    if subscription.room.status == RoomStatus::Waiting {
        membership_watch::spawn(state.clone(), subscription.room.clone());
    }

    let receiver = spawn_forwarder(state, subscription);
    let stream = ReceiverStream::new(receiver).map(|payload| Ok(into_event(payload)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn into_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Forward the opening events, then every change, relay and status flip, until the client
/// leaves or the room ends.
///
/// Relay hubs going away only stops relaying; the change feed still delivers the final status.
fn spawn_forwarder(state: SharedState, subscription: RoomSubscription) -> mpsc::Receiver<ServerEvent> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<ServerEvent>(8);

    tokio::spawn(async move {
        let RoomSubscription {
            room,
            initial,
            mut projection,
            mut changes,
            mut public,
            mut host,
            mut degraded,
        } = subscription;

        let mut pending = initial;
        let mut ended = false;
        'stream: loop {
            for event in pending.drain(..) {
                if tx.send(event).await.is_err() {
                    break 'stream;
                }
            }
            if ended {
                break;
            }

            tokio::select! {
                _ = tx.closed() => break,
                change = changes.recv() => match change {
                    Ok(change) => {
                        (pending, ended) = project(&state, &room, &mut projection, change).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(room = %room.code, skipped, "room stream lagged behind the change feed");
                    }
                    Err(RecvError::Closed) => break,
                },
                relayed = recv_relay(&mut public) => match relayed {
                    Ok(event) => pending.push(event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => public = None,
                },
                notice = recv_relay(&mut host) => match notice {
                    Ok(event) => pending.push(event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => host = None,
                },
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let value = *degraded.borrow_and_update();
                    pending.extend(sse_events::system_status_event(value));
                }
            }
        }

        info!(room = %room.code, "room SSE stream disconnected");
    });

    rx
}

async fn recv_relay(
    relay: &mut Option<broadcast::Receiver<ServerEvent>>,
) -> Result<ServerEvent, RecvError> {
    match relay {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn project(
    state: &SharedState,
    room: &RoomEntity,
    projection: &mut ObserverProjection,
    change: RecordChange,
) -> (Vec<ServerEvent>, bool) {
    let mut events = Vec::new();
    let mut ended = false;
    for update in projection.apply(change) {
        match update {
            ProjectionUpdate::Snapshot(snapshot) => {
                events.extend(sse_events::snapshot_event(&snapshot));
            }
            ProjectionUpdate::Status(updated) => {
                ended |= updated.status == RoomStatus::Ended;
                events.extend(sse_events::status_event(&updated));
            }
            ProjectionUpdate::MembersChanged => {
                let Some(store) = state.store().await else {
                    continue;
                };
                match load_members(store.as_ref(), room).await {
                    Ok(members) => events.extend(sse_events::members_event(&members)),
                    Err(err) => {
                        warn!(room = %room.code, error = %err, "member list refresh failed");
                    }
                }
            }
        }
    }
    (events, ended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::{
            room::CreateRoomRequest,
            sse::{HANDSHAKE, ROOM_MEMBERS, ROOM_SNAPSHOT, ROOM_STATUS, TURN_NOTICE},
        },
        services::room_service,
        state::{
            AppState,
            catalog::{Mode, SessionKind},
        },
    };

    async fn next(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("stream open")
    }

    async fn group_room(state: &SharedState) -> String {
        room_service::create_room(
            state,
            "ana",
            CreateRoomRequest {
                mode: Mode::Group,
                session_kind: SessionKind::Online,
                fictional_players: Vec::new(),
            },
        )
        .await
        .unwrap()
        .code
    }

    #[tokio::test]
    async fn streams_open_with_the_current_room_state() {
        let state = AppState::with_memory_store().await;
        let code = group_room(&state).await;

        let subscription = subscribe_room(&state, &code, Some("bia")).await.unwrap();
        assert!(!subscription.is_host());
        let mut rx = spawn_forwarder(state.clone(), subscription);

        let names = [next(&mut rx).await, next(&mut rx).await, next(&mut rx).await]
            .map(|event| event.event.unwrap_or_default());
        assert_eq!(names, [HANDSHAKE, ROOM_STATUS, ROOM_MEMBERS]);

        room_service::join(&state, Some("bia"), &code).await.unwrap();
        let members = next(&mut rx).await;
        assert_eq!(members.event.as_deref(), Some(ROOM_MEMBERS));
        assert!(members.data.contains("bia"));
    }

    #[tokio::test]
    async fn observers_follow_the_host_snapshots() {
        let state = AppState::with_memory_store().await;
        let code = group_room(&state).await;
        for player in ["bia", "carla"] {
            room_service::join(&state, Some(player), &code).await.unwrap();
        }

        let subscription = subscribe_room(&state, &code, Some("carla")).await.unwrap();
        let mut rx = spawn_forwarder(state.clone(), subscription);
        for _ in 0..3 {
            next(&mut rx).await;
        }

        room_service::start(&state, "ana", &code).await.unwrap();
        let snapshot = next(&mut rx).await;
        assert_eq!(snapshot.event.as_deref(), Some(ROOM_SNAPSHOT));
        let status = next(&mut rx).await;
        assert_eq!(status.event.as_deref(), Some(ROOM_STATUS));
        assert!(status.data.contains("in_game"));
    }

    #[tokio::test]
    async fn host_notices_reach_only_the_host() {
        let state = AppState::with_memory_store().await;
        let code = group_room(&state).await;

        let host = subscribe_room(&state, &code, Some("ana")).await.unwrap();
        assert!(host.is_host());
        let room_id = host.room.id;
        let mut host_rx = spawn_forwarder(state.clone(), host);
        let guest = subscribe_room(&state, &code, Some("bia")).await.unwrap();
        let mut guest_rx = spawn_forwarder(state.clone(), guest);
        for _ in 0..3 {
            next(&mut host_rx).await;
            next(&mut guest_rx).await;
        }

        sse_events::notify_no_prompt(&state.rooms().room(room_id), 2);
        let notice = next(&mut host_rx).await;
        assert_eq!(notice.event.as_deref(), Some(TURN_NOTICE));
        assert!(guest_rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn observers_receive_the_ended_status_before_the_stream_stops() {
        let state = AppState::with_memory_store().await;
        for _ in 0..20 {
            let code = group_room(&state).await;
            for player in ["bia", "carla"] {
                room_service::join(&state, Some(player), &code).await.unwrap();
            }
            room_service::start(&state, "ana", &code).await.unwrap();

            let subscription = subscribe_room(&state, &code, Some("bia")).await.unwrap();
            let mut rx = spawn_forwarder(state.clone(), subscription);
            room_service::close(&state, "ana", &code).await.unwrap();

            let mut last_status = None;
            while let Some(event) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("stream ends in time")
            {
                if event.event.as_deref() == Some(ROOM_STATUS) {
                    last_status = Some(event.data);
                }
            }
            assert!(last_status.expect("a status event").contains("ended"));
        }
    }
}
