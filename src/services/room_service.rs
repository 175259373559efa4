use std::{collections::HashMap, time::SystemTime};

use rand::{SeedableRng, rngs::StdRng};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{FictionalPlayerEntity, MembershipEntity, RoomEntity, RoomUpdate},
        record_store::RecordStore,
    },
    dto::room::{CreateRoomRequest, JoinResponse, JoinRoute, RoomSettingsRequest, RoomView},
    error::ServiceError,
    services::{preference_service, room_code},
    state::{
        SharedState,
        catalog::{Category, IntensityLevel, Mode, Player, PlayerId, SessionKind},
        favorites::FavoritesPool,
        preferences::PreferenceIndex,
        room::{RoomEvent, RoomStatus, check_start},
        session::{HostSession, MatchSummary, Roster, SessionRoom},
    },
};

/// Create a room hosted by `caller`, under a fresh code.
pub async fn create_room(
    state: &SharedState,
    caller: &str,
    request: CreateRoomRequest,
) -> Result<RoomView, ServiceError> {
    let fictional_players = fictional_players(state, &request)?;
    let store = state.require_store().await?;

    let room = RoomEntity {
        id: Uuid::new_v4(),
        code: String::new(),
        host_id: caller.to_owned(),
        mode: request.mode,
        session_kind: request.session_kind,
        status: RoomStatus::Waiting,
        fictional_players,
        active_categories: request.mode.categories().to_vec(),
        punishment: None,
        escalation: false,
        turn_snapshot: None,
        session_ledger: None,
        summary: None,
        created_at: SystemTime::now(),
        ended_at: None,
    };

    let mut rng = StdRng::from_os_rng();
    let room = room_code::insert_with_fresh_code(
        store.as_ref(),
        room,
        state.config().room_code_attempts,
        &mut rng,
    )
    .await?;

    if room.session_kind == SessionKind::Online {
        store
            .upsert_member(MembershipEntity {
                room_id: room.id,
                player_id: caller.to_owned(),
                joined_at: SystemTime::now(),
            })
            .await?;
    }

    info!(room = %room.code, mode = room.mode.as_str(), host = %caller, "room created");
    let members = load_members(store.as_ref(), &room).await?;
    Ok(RoomView::from_parts(&room, &members))
}

fn fictional_players(
    state: &SharedState,
    request: &CreateRoomRequest,
) -> Result<Vec<FictionalPlayerEntity>, ServiceError> {
    let count = request.fictional_players.len();
    match request.session_kind {
        SessionKind::Online if count > 0 => {
            return Err(ServiceError::InvalidInput(
                "fictional players are only accepted in solo sessions".into(),
            ));
        }
        SessionKind::Online => return Ok(Vec::new()),
        SessionKind::Solo => {}
    }

    let max = match request.mode {
        Mode::Couple => 2,
        Mode::Group => state.config().max_fictional_players,
    };
    if !request.mode.accepts_headcount(count) || count > max {
        return Err(ServiceError::InvalidInput(format!(
            "a {} solo session cannot be played by {count} players",
            request.mode.as_str()
        )));
    }

    request
        .fictional_players
        .iter()
        .map(|input| {
            let name = input.name.trim();
            if name.is_empty() {
                return Err(ServiceError::InvalidInput("player names cannot be blank".into()));
            }
            match IntensityLevel::try_from(input.level) {
                Ok(IntensityLevel::Never) | Err(_) => Err(ServiceError::InvalidInput(format!(
                    "level of `{name}` must be between 1 and 3"
                ))),
                Ok(level) => Ok(FictionalPlayerEntity {
                    name: name.to_owned(),
                    level,
                }),
            }
        })
        .collect()
}

/// Room projection by code.
pub async fn room_view(state: &SharedState, code: &str) -> Result<RoomView, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    let members = load_members(store.as_ref(), &room).await?;
    Ok(RoomView::from_parts(&room, &members))
}

/// Join entry point: route the host, register everyone else.
///
/// Without an identity the join is deferred: the error carries the code to resume with.
pub async fn join(
    state: &SharedState,
    caller: Option<&str>,
    code: &str,
) -> Result<JoinResponse, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    let Some(caller) = caller else {
        return Err(ServiceError::DeferredJoin(room.code));
    };

    let route = if caller == room.host_id {
        match room.status {
            RoomStatus::Waiting => JoinRoute::Lobby,
            RoomStatus::InGame => JoinRoute::Game,
            RoomStatus::Ended => JoinRoute::Closed,
        }
    } else if room.status == RoomStatus::Ended {
        JoinRoute::Closed
    } else {
        ensure_seat(store.as_ref(), &room, caller).await?;
        let inserted = store
            .upsert_member(MembershipEntity {
                room_id: room.id,
                player_id: caller.to_owned(),
                joined_at: SystemTime::now(),
            })
            .await?;
        if inserted {
            info!(room = %room.code, player = %caller, "player joined");
        }
        JoinRoute::Waiting
    };

    let members = load_members(store.as_ref(), &room).await?;
    Ok(JoinResponse {
        route,
        room: RoomView::from_parts(&room, &members),
    })
}

/// Refuse a newcomer once an online room has no seat left. Members keep their seat.
async fn ensure_seat(store: &dyn RecordStore, room: &RoomEntity, caller: &str) -> Result<(), ServiceError> {
    let Some(seats) = room.mode.seat_limit() else {
        return Ok(());
    };
    if room.session_kind == SessionKind::Solo {
        return Ok(());
    }

    let members = store.list_members(room.id).await?;
    let seated = members.iter().any(|member| member.player_id == caller);
    if !seated && members.len() >= seats {
        warn!(room = %room.code, player = %caller, seats, "join refused: room is full");
        return Err(ServiceError::InvalidState(format!("room {} is full", room.code)));
    }
    Ok(())
}

/// Edit the allowlist, punishment text and escalation flag.
pub async fn update_settings(
    state: &SharedState,
    caller: &str,
    code: &str,
    request: RoomSettingsRequest,
) -> Result<RoomView, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    ensure_host(&room, caller)?;
    if room.status == RoomStatus::Ended {
        return Err(ServiceError::InvalidState(format!(
            "room {} has ended",
            room.code
        )));
    }

    let allowlist = normalize_allowlist(room.mode, &request.active_categories)?;
    let punishment = request
        .punishment
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty());

    let updated = store
        .update_room(
            room.id,
            RoomUpdate {
                active_categories: Some(allowlist.clone()),
                punishment: Some(punishment.clone()),
                escalation: Some(request.escalation),
                ..RoomUpdate::default()
            },
        )
        .await?
        .ok_or_else(|| room_not_found(&room.code))?;

    if let Some(session) = state.session(room.id) {
        session
            .lock()
            .await
            .update_settings(allowlist, punishment, request.escalation);
    }

    info!(
        room = %room.code,
        categories = updated.active_categories.len(),
        escalation = updated.escalation,
        "room settings updated"
    );
    let members = load_members(store.as_ref(), &updated).await?;
    Ok(RoomView::from_parts(&updated, &members))
}

fn normalize_allowlist(mode: Mode, requested: &[Category]) -> Result<Vec<Category>, ServiceError> {
    let mut allowlist = Vec::with_capacity(requested.len());
    for category in requested {
        if category.mode() != mode {
            return Err(ServiceError::InvalidInput(format!(
                "category `{}` does not belong to mode `{}`",
                category.as_str(),
                mode.as_str()
            )));
        }
        if !allowlist.contains(category) {
            allowlist.push(*category);
        }
    }
    if allowlist.is_empty() {
        return Err(ServiceError::InvalidInput(
            "at least one category must stay active".into(),
        ));
    }
    Ok(allowlist)
}

/// Start the match once the headcount fits the mode.
pub async fn start(state: &SharedState, caller: &str, code: &str) -> Result<RoomView, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    ensure_host(&room, caller)?;

    let roster = load_roster(store.as_ref(), &room).await?;
    let status = check_start(room.status, room.mode, roster.players.len())?;

    let session = HostSession::new(session_room(state, &room), roster);
    let updated = store
        .update_room(
            room.id,
            RoomUpdate {
                expected_status: Some(room.status),
                status: Some(status),
                turn_snapshot: Some(session.snapshot()),
                session_ledger: Some(session.ledger()),
                ..RoomUpdate::default()
            },
        )
        .await?
        .ok_or_else(|| room_not_found(&room.code))?;

    let members = session.roster().players.clone();
    state.drop_session(room.id);
    state.install_session(room.id, session);

    info!(room = %room.code, players = members.len(), "match started");
    Ok(RoomView::from_parts(&updated, &members))
}

/// End the room, persisting the match summary.
pub async fn close(state: &SharedState, caller: &str, code: &str) -> Result<RoomView, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    ensure_host(&room, caller)?;
    let status = room.status.apply(RoomEvent::Close)?;

    // A session only belongs to the match this close observed in game.
    let live = match room.status {
        RoomStatus::InGame => state.session(room.id),
        _ => None,
    };
    let (summary, snapshot) = match live {
        Some(handle) => {
            let mut session = handle.lock().await;
            let summary = session.end()?;
            (summary, Some(session.snapshot()))
        }
        None => {
            let rounds = room
                .turn_snapshot
                .as_ref()
                .map_or(0, |snapshot| snapshot.round.saturating_sub(1));
            let ledger = room.session_ledger.clone().unwrap_or_default();
            let summary = MatchSummary {
                rounds,
                skips: ledger.skips,
                penalties: ledger.penalties,
                vetoes: ledger.vetoes,
                categories: ledger.categories,
            };
            (summary, None)
        }
    };

    let updated = store
        .update_room(
            room.id,
            RoomUpdate {
                expected_status: Some(room.status),
                status: Some(status),
                summary: Some(summary),
                turn_snapshot: snapshot,
                ended_at: Some(SystemTime::now()),
                ..RoomUpdate::default()
            },
        )
        .await?
        .ok_or_else(|| room_not_found(&room.code))?;
    state.drop_session(room.id);
    state.rooms().remove(room.id);

    info!(room = %room.code, from = room.status.as_str(), "room closed");
    let members = load_members(store.as_ref(), &updated).await?;
    Ok(RoomView::from_parts(&updated, &members))
}

/// Room by user-supplied code.
pub(crate) async fn find_room(store: &dyn RecordStore, code: &str) -> Result<RoomEntity, ServiceError> {
    let normalized = room_code::normalize(code).ok_or_else(|| room_not_found(code))?;
    store
        .find_room_by_code(normalized)
        .await?
        .ok_or_else(|| room_not_found(code))
}

fn room_not_found(code: &str) -> ServiceError {
    ServiceError::NotFound(format!("room `{code}` not found"))
}

/// Reject callers other than the room's host.
pub(crate) fn ensure_host(room: &RoomEntity, caller: &str) -> Result<(), ServiceError> {
    if room.host_id == caller {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "only the host can manage room {}",
            room.code
        )))
    }
}

/// Turn settings of a stored room.
pub(crate) fn session_room(state: &SharedState, room: &RoomEntity) -> SessionRoom {
    SessionRoom {
        id: room.id,
        code: room.code.clone(),
        host_id: room.host_id.clone(),
        mode: room.mode,
        kind: room.session_kind,
        allowlist: room.active_categories.clone(),
        punishment: room.punishment.clone(),
        escalation: room.escalation,
        escalation_step: state.config().escalation_step,
    }
}

fn fictional_id(index: usize) -> PlayerId {
    format!("fictional-{}", index + 1)
}

/// Participants of a room in join order.
pub(crate) async fn load_members(
    store: &dyn RecordStore,
    room: &RoomEntity,
) -> Result<Vec<Player>, ServiceError> {
    if room.session_kind == SessionKind::Solo {
        return Ok(room
            .fictional_players
            .iter()
            .enumerate()
            .map(|(index, fictional)| Player {
                id: fictional_id(index),
                display_name: Some(fictional.name.clone()),
                avatar_url: None,
            })
            .collect());
    }

    let ids = store
        .list_members(room.id)
        .await?
        .into_iter()
        .map(|member| member.player_id)
        .collect::<Vec<_>>();
    let mut profiles = store
        .find_users(ids.clone())
        .await?
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect::<HashMap<_, _>>();

    Ok(ids
        .into_iter()
        .map(|id| match profiles.remove(&id) {
            Some(user) => Player::from(user),
            None => Player {
                id,
                display_name: None,
                avatar_url: None,
            },
        })
        .collect())
}

/// Participants with their preferences and favorites, read now.
///
/// Preference and favorite read failures degrade to defaults; only the member list is required.
pub(crate) async fn load_roster(
    store: &dyn RecordStore,
    room: &RoomEntity,
) -> Result<Roster, ServiceError> {
    let players = load_members(store, room).await?;

    let preferences = match room.session_kind {
        SessionKind::Online => {
            let ids = players.iter().map(|player| player.id.clone()).collect();
            preference_service::load_index(store, ids, room.mode).await
        }
        SessionKind::Solo => {
            let mut index = PreferenceIndex::new();
            for (index_pos, fictional) in room.fictional_players.iter().enumerate() {
                index.set_uniform(fictional_id(index_pos), room.mode, fictional.level);
            }
            index
        }
    };

    let favorite_owners = match room.session_kind {
        SessionKind::Online => players.iter().map(|player| player.id.clone()).collect(),
        SessionKind::Solo => vec![room.host_id.clone()],
    };
    let favorites = match store.list_favorites(favorite_owners).await {
        Ok(rows) => FavoritesPool::from_pairs(rows.into_iter().map(|row| (row.player_id, row.prompt_id))),
        Err(err) => {
            warn!(room = %room.code, error = %err, "favorites load failed; drawing without weights");
            FavoritesPool::new()
        }
    };

    Ok(Roster {
        players,
        preferences,
        favorites,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::FictionalPlayerInput,
        state::AppState,
    };

    fn online(mode: Mode) -> CreateRoomRequest {
        CreateRoomRequest {
            mode,
            session_kind: SessionKind::Online,
            fictional_players: Vec::new(),
        }
    }

    #[tokio::test]
    async fn host_is_the_first_member() {
        let state = AppState::with_memory_store().await;
        let view = create_room(&state, "ana", online(Mode::Group)).await.unwrap();

        assert!(room_code::is_valid(&view.code));
        assert_eq!(view.status, RoomStatus::Waiting);
        assert_eq!(view.active_categories.len(), 6);
        assert_eq!(view.members.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["ana"]);
    }

    #[tokio::test]
    async fn joins_are_routed_and_deduplicated() {
        let state = AppState::with_memory_store().await;
        let view = create_room(&state, "ana", online(Mode::Couple)).await.unwrap();
        let code = view.code.to_lowercase();

        let host = join(&state, Some("ana"), &code).await.unwrap();
        assert_eq!(host.route, JoinRoute::Lobby);

        for _ in 0..2 {
            let guest = join(&state, Some("bia"), &code).await.unwrap();
            assert_eq!(guest.route, JoinRoute::Waiting);
            assert_eq!(guest.room.members.len(), 2);
        }

        let err = join(&state, None, &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::DeferredJoin(ref c) if *c == view.code));

        let err = join(&state, Some("bia"), "ZZZZZZ").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_requires_the_mode_headcount() {
        let state = AppState::with_memory_store().await;
        let view = create_room(&state, "ana", online(Mode::Group)).await.unwrap();
        join(&state, Some("bia"), &view.code).await.unwrap();

        let err = start(&state, "ana", &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        join(&state, Some("carla"), &view.code).await.unwrap();
        let err = start(&state, "bia", &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let started = start(&state, "ana", &view.code).await.unwrap();
        assert_eq!(started.status, RoomStatus::InGame);
        assert_eq!(started.snapshot.map(|s| s.round), Some(1));
        assert!(state.session(view.id).is_some());

        let err = start(&state, "ana", &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn settings_keep_a_non_empty_allowlist_of_the_mode() {
        let state = AppState::with_memory_store().await;
        let view = create_room(&state, "ana", online(Mode::Group)).await.unwrap();

        let err = update_settings(
            &state,
            "ana",
            &view.code,
            RoomSettingsRequest {
                active_categories: vec![Category::Roleplay],
                punishment: None,
                escalation: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let updated = update_settings(
            &state,
            "ana",
            &view.code,
            RoomSettingsRequest {
                active_categories: vec![Category::Kiss, Category::Kiss, Category::Touch],
                punishment: Some("  Sing a song ".into()),
                escalation: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.active_categories, [Category::Kiss, Category::Touch]);
        assert_eq!(updated.punishment.as_deref(), Some("Sing a song"));
        assert!(updated.escalation);
    }

    #[tokio::test]
    async fn closing_is_monotonic() {
        let state = AppState::with_memory_store().await;
        let view = create_room(&state, "ana", online(Mode::Group)).await.unwrap();

        let closed = close(&state, "ana", &view.code).await.unwrap();
        assert_eq!(closed.status, RoomStatus::Ended);
        assert_eq!(closed.summary.map(|s| s.rounds), Some(0));
        assert!(closed.ended_at.is_some());

        let err = close(&state, "ana", &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let err = start(&state, "ana", &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let late = join(&state, Some("bia"), &view.code).await.unwrap();
        assert_eq!(late.route, JoinRoute::Closed);
    }

    #[tokio::test]
    async fn solo_sessions_play_with_fictional_players() {
        let state = AppState::with_memory_store().await;
        let request = CreateRoomRequest {
            mode: Mode::Couple,
            session_kind: SessionKind::Solo,
            fictional_players: vec![
                FictionalPlayerInput {
                    name: "Ana".into(),
                    level: 3,
                },
                FictionalPlayerInput {
                    name: "Bia".into(),
                    level: 1,
                },
            ],
        };
        let view = create_room(&state, "host", request).await.unwrap();
        assert_eq!(view.members.len(), 2);
        assert_eq!(view.members[0].id, "fictional-1");

        let store = state.require_store().await.unwrap();
        let room = find_room(store.as_ref(), &view.code).await.unwrap();
        let roster = load_roster(store.as_ref(), &room).await.unwrap();
        assert_eq!(
            roster.preferences.level("fictional-1", Category::Roleplay),
            IntensityLevel::Intense
        );

        let started = start(&state, "host", &view.code).await.unwrap();
        assert_eq!(started.status, RoomStatus::InGame);
    }

    #[tokio::test]
    async fn solo_headcount_is_checked_at_creation() {
        let state = AppState::with_memory_store().await;
        let request = CreateRoomRequest {
            mode: Mode::Group,
            session_kind: SessionKind::Solo,
            fictional_players: vec![FictionalPlayerInput {
                name: "Ana".into(),
                level: 2,
            }],
        };
        let err = create_room(&state, "host", request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn couple_rooms_seat_two_players() {
        let state = AppState::with_memory_store().await;
        let view = create_room(&state, "ana", online(Mode::Couple)).await.unwrap();
        join(&state, Some("bia"), &view.code).await.unwrap();

        let err = join(&state, Some("carla"), &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        start(&state, "ana", &view.code).await.unwrap();
        let err = join(&state, Some("carla"), &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let again = join(&state, Some("bia"), &view.code).await.unwrap();
        assert_eq!(again.route, JoinRoute::Waiting);
        assert_eq!(again.room.members.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_start_and_close_never_reopen_a_room() {
        let state = AppState::with_memory_store().await;
        for _ in 0..50 {
            let view = create_room(&state, "ana", online(Mode::Group)).await.unwrap();
            for player in ["bia", "carla"] {
                join(&state, Some(player), &view.code).await.unwrap();
            }

            let starting = tokio::spawn({
                let (state, code) = (state.clone(), view.code.clone());
                async move { start(&state, "ana", &code).await }
            });
            let closing = tokio::spawn({
                let (state, code) = (state.clone(), view.code.clone());
                async move { close(&state, "ana", &code).await }
            });
            let started = starting.await.unwrap();
            let closed = closing.await.unwrap();
            assert!(started.is_ok() || closed.is_ok());

            let status = room_view(&state, &view.code).await.unwrap().status;
            if closed.is_ok() {
                assert_eq!(status, RoomStatus::Ended);
            } else {
                assert!(matches!(closed, Err(ServiceError::InvalidState(_))));
                assert_eq!(status, RoomStatus::InGame);
            }
        }
    }
}
