//! Host-driven turn actions.
//!
//! Every mutating action runs on its own task: a client hanging up mid-request
//! cannot leave a planned transition half done. Each committed transition is
//! followed by a full snapshot write so observers converge.

use std::{future::Future, sync::Arc};

use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{PromptQuery, RoomEntity},
        record_store::RecordStore,
    },
    dto::{
        catalog::LevelView,
        turn::{MatchSummaryView, TurnSnapshotView, TurnView},
    },
    error::ServiceError,
    services::{
        room_service::{ensure_host, find_room, load_roster, session_room},
        selector::{CachedPromptSource, PromptSelector, PromptSource, SelectorSettings},
        sse_events::{self, NO_PROMPT_NOTICE},
    },
    state::{
        RoomChannels, SessionHandle, SharedState,
        catalog::{IntensityLevel, PromptKind},
        room::RoomStatus,
        session::{HostSession, Roster, VetoOutcome},
        transitions::replicate_snapshot,
    },
};

struct HostContext {
    store: Arc<dyn RecordStore>,
    room: RoomEntity,
    session: SessionHandle,
    channels: Arc<RoomChannels>,
}

#[derive(Debug, Default)]
struct Outcome {
    notice: Option<String>,
    level_up: Option<IntensityLevel>,
    veto_exhausted: bool,
}

/// Current turn as seen by the host.
pub async fn view(state: &SharedState, caller: &str, code: &str) -> Result<TurnView, ServiceError> {
    let ctx = host_context(state, caller, code).await?;
    let session = ctx.session.lock().await;
    Ok(turn_view(&ctx, &session, Outcome::default()).await)
}

/// Draw the acting player of the round.
pub async fn draw(state: &SharedState, caller: &str, code: &str) -> Result<TurnView, ServiceError> {
    let (state, caller, code) = owned(state, caller, code);
    detached(async move {
        let ctx = host_context(&state, &caller, &code).await?;
        let roster = refreshed_roster(&ctx).await;

        let mut session = ctx.session.lock().await;
        if let Some(roster) = roster {
            session.refresh_roster(roster);
        }
        let actor = session.draw(&mut StdRng::from_os_rng())?.id.clone();
        info!(room = %ctx.room.code, round = session.round(), actor = %actor, "turn drawn");

        replicate_snapshot(&state, &session).await;
        Ok(turn_view(&ctx, &session, Outcome::default()).await)
    })
    .await
}

/// Record the acting player's choice and show a compatible prompt.
///
/// When nothing compatible exists the round is skipped and the host is told so.
pub async fn choose(
    state: &SharedState,
    caller: &str,
    code: &str,
    kind: PromptKind,
) -> Result<TurnView, ServiceError> {
    let (state, caller, code) = owned(state, caller, code);
    detached(async move {
        let ctx = host_context(&state, &caller, &code).await?;
        let roster = refreshed_roster(&ctx).await;

        let mut session = ctx.session.lock().await;
        if let Some(roster) = roster {
            session.refresh_roster(roster);
        }
        let (plan, request) = session.plan_choice(kind)?;

        let selector = PromptSelector::new(
            Arc::new(CachedPromptSource::new(ctx.store.clone(), state.prompt_cache())),
            SelectorSettings::from(state.config()),
        );
        let selection = selector.select(&request, &mut StdRng::from_os_rng()).await;

        let mut outcome = Outcome::default();
        match selection {
            Some(selection) => {
                debug!(
                    room = %ctx.room.code,
                    prompt = %selection.prompt.id,
                    category = selection.prompt.category.as_str(),
                    "prompt selected"
                );
                session.show_selection(plan.id, kind, selection)?;
            }
            None => {
                let round = session.round();
                outcome.level_up = session.abandon_choice(plan.id)?;
                outcome.notice = Some(NO_PROMPT_NOTICE.to_string());
                sse_events::notify_no_prompt(&ctx.channels, round);
                info!(room = %ctx.room.code, round, kind = kind.as_str(), "no compatible prompt; round skipped");
            }
        }

        announce_level_up(&ctx, &session, &outcome);
        replicate_snapshot(&state, &session).await;
        Ok(turn_view(&ctx, &session, outcome).await)
    })
    .await
}

/// Replace the prompt on screen with a penalty of the same category and type.
///
/// With an empty penalty pool the round simply moves on.
pub async fn skip(state: &SharedState, caller: &str, code: &str) -> Result<TurnView, ServiceError> {
    let (state, caller, code) = owned(state, caller, code);
    detached(async move {
        let ctx = host_context(&state, &caller, &code).await?;
        let mut session = ctx.session.lock().await;
        let (plan, query) = session.plan_skip()?;

        let source = CachedPromptSource::new(ctx.store.clone(), state.prompt_cache());
        let pool = source
            .find_prompts(PromptQuery {
                mode: query.mode,
                category: query.category,
                kind: query.kind,
                max_level: None,
                limit: state.config().skip_fetch_limit,
            })
            .await
            .unwrap_or_else(|err| {
                warn!(room = %ctx.room.code, error = %err, "penalty pool unavailable");
                Vec::new()
            });

        let mut outcome = Outcome::default();
        match session.pick_penalty(pool, &mut StdRng::from_os_rng()) {
            Some(penalty) => {
                session.show_penalty(plan.id, penalty)?;
                info!(room = %ctx.room.code, round = session.round(), "penalty shown");
            }
            None => {
                outcome.level_up = session.abandon_skip(plan.id)?;
                info!(room = %ctx.room.code, "no penalty available; next round");
            }
        }

        announce_level_up(&ctx, &session, &outcome);
        replicate_snapshot(&state, &session).await;
        Ok(turn_view(&ctx, &session, outcome).await)
    })
    .await
}

/// Finish the current prompt and move to the next round.
pub async fn advance(state: &SharedState, caller: &str, code: &str) -> Result<TurnView, ServiceError> {
    let (state, caller, code) = owned(state, caller, code);
    detached(async move {
        let ctx = host_context(&state, &caller, &code).await?;
        let mut session = ctx.session.lock().await;

        let outcome = Outcome {
            level_up: session.advance()?,
            ..Outcome::default()
        };
        debug!(room = %ctx.room.code, round = session.round(), "round advanced");

        announce_level_up(&ctx, &session, &outcome);
        replicate_snapshot(&state, &session).await;
        Ok(turn_view(&ctx, &session, outcome).await)
    })
    .await
}

/// Spend the acting player's veto. A player who already vetoed gets the view back unchanged.
pub async fn veto(state: &SharedState, caller: &str, code: &str) -> Result<TurnView, ServiceError> {
    let (state, caller, code) = owned(state, caller, code);
    detached(async move {
        let ctx = host_context(&state, &caller, &code).await?;
        let mut session = ctx.session.lock().await;

        let mut outcome = Outcome::default();
        match session.veto()? {
            VetoOutcome::Applied(level_up) => {
                outcome.level_up = level_up;
                info!(room = %ctx.room.code, round = session.round(), "veto spent");
                announce_level_up(&ctx, &session, &outcome);
                replicate_snapshot(&state, &session).await;
            }
            VetoOutcome::Exhausted => {
                outcome.veto_exhausted = true;
                debug!(room = %ctx.room.code, "veto already spent");
            }
        }

        Ok(turn_view(&ctx, &session, outcome).await)
    })
    .await
}

fn owned(state: &SharedState, caller: &str, code: &str) -> (SharedState, String, String) {
    (state.clone(), caller.to_owned(), code.to_owned())
}

async fn detached<F, T>(task: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task).await.map_err(|err| {
        warn!(error = %err, "turn task did not complete");
        ServiceError::Internal(format!("turn task failed: {err}"))
    })?
}

async fn host_context(
    state: &SharedState,
    caller: &str,
    code: &str,
) -> Result<HostContext, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    ensure_host(&room, caller)?;
    if room.status != RoomStatus::InGame {
        return Err(ServiceError::InvalidState(format!(
            "room {} is not in game",
            room.code
        )));
    }

    let session = match state.session(room.id) {
        Some(session) => session,
        None => {
            let roster = load_roster(store.as_ref(), &room).await?;
            let settings = session_room(state, &room);
            let session = match room.turn_snapshot.clone() {
                Some(snapshot) => {
                    HostSession::restore(settings, roster, snapshot, room.session_ledger.clone())
                }
                None => HostSession::new(settings, roster),
            };
            info!(room = %room.code, "host session rebuilt from the stored snapshot");
            state.install_session(room.id, session)
        }
    };
    let channels = state.rooms().room(room.id);

    Ok(HostContext {
        store,
        room,
        session,
        channels,
    })
}

async fn refreshed_roster(ctx: &HostContext) -> Option<Roster> {
    match load_roster(ctx.store.as_ref(), &ctx.room).await {
        Ok(roster) => Some(roster),
        Err(err) => {
            warn!(room = %ctx.room.code, error = %err, "roster refresh failed; keeping the previous one");
            None
        }
    }
}

fn announce_level_up(ctx: &HostContext, session: &HostSession, outcome: &Outcome) {
    if let Some(level) = outcome.level_up {
        info!(room = %ctx.room.code, round = session.round(), level = level.label(), "escalation level up");
        sse_events::notify_level_up(&ctx.channels, session.round(), level);
    }
}

async fn turn_view(ctx: &HostContext, session: &HostSession, outcome: Outcome) -> TurnView {
    TurnView {
        snapshot: TurnSnapshotView::from(&session.snapshot()),
        can_veto: session
            .acting()
            .is_some_and(|player| session.can_veto(&player.id)),
        escalation_level: session.escalation_cap().map(LevelView::from),
        counters: MatchSummaryView::from(&session.summary()),
        recent_reactions: ctx.channels.recent_reactions().await,
        notice: outcome.notice,
        level_up: outcome.level_up.map(LevelView::from),
        veto_exhausted: outcome.veto_exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::{
            prompts::{ImportPromptsRequest, PromptInput},
            room::{CreateRoomRequest, RoomSettingsRequest},
            sse::TURN_NOTICE,
        },
        services::{prompt_service, room_service},
        state::{
            AppState,
            catalog::{Category, Mode, SessionKind},
            turn::TurnPhase,
        },
    };

    async fn couple_room(state: &SharedState, allowlist: Vec<Category>) -> (uuid::Uuid, String) {
        let view = room_service::create_room(
            state,
            "ana",
            CreateRoomRequest {
                mode: Mode::Couple,
                session_kind: SessionKind::Online,
                fictional_players: Vec::new(),
            },
        )
        .await
        .unwrap();
        room_service::join(state, Some("bia"), &view.code).await.unwrap();
        room_service::update_settings(
            state,
            "ana",
            &view.code,
            RoomSettingsRequest {
                active_categories: allowlist,
                punishment: Some("Sing a song".into()),
                escalation: false,
            },
        )
        .await
        .unwrap();
        room_service::start(state, "ana", &view.code).await.unwrap();
        (view.id, view.code)
    }

    async fn import_reveal_truths(state: &SharedState) {
        let prompts = ["Tell a secret", "Describe [JOGADOR] in three words"]
            .into_iter()
            .map(|text| PromptInput {
                id: None,
                mode: Mode::Couple,
                category: Category::Reveal,
                level: 1,
                kind: PromptKind::Truth,
                participants: None,
                text: text.into(),
            })
            .collect();
        prompt_service::import(state, ImportPromptsRequest { prompts })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_round_with_penalty_and_vetoes() {
        let state = AppState::with_memory_store().await;
        import_reveal_truths(&state).await;
        let (_, code) = couple_room(&state, vec![Category::Reveal]).await;

        let drawn = draw(&state, "ana", &code).await.unwrap();
        assert_eq!(drawn.snapshot.phase, TurnPhase::Choosing);
        let first = drawn.snapshot.acting.unwrap().id;

        let shown = choose(&state, "ana", &code, PromptKind::Truth).await.unwrap();
        assert_eq!(shown.snapshot.phase, TurnPhase::ShowingPrompt);
        assert_eq!(shown.snapshot.prompt.unwrap().category, Category::Reveal);
        assert!(shown.can_veto);

        let penalty = skip(&state, "ana", &code).await.unwrap();
        assert!(penalty.snapshot.is_penalty);
        assert!(penalty.snapshot.prompt.unwrap().text.ends_with("Sing a song"));
        assert_eq!((penalty.counters.skips, penalty.counters.penalties), (1, 1));

        let next = advance(&state, "ana", &code).await.unwrap();
        assert_eq!((next.snapshot.round, next.snapshot.phase), (2, TurnPhase::Drawing));

        let handoff = draw(&state, "ana", &code).await.unwrap();
        let second = handoff.snapshot.acting.unwrap().id;
        assert_ne!(first, second);
        choose(&state, "ana", &code, PromptKind::Truth).await.unwrap();
        let vetoed = veto(&state, "ana", &code).await.unwrap();
        assert_eq!(vetoed.snapshot.round, 3);
        assert!(!vetoed.can_veto);
        assert_eq!(vetoed.counters.vetoes, 1);

        draw(&state, "ana", &code).await.unwrap();
        hand_back_to(&state, &code, &second).await;
        let again = veto(&state, "ana", &code).await.unwrap();
        assert!(again.veto_exhausted);
        assert_eq!(again.counters.vetoes, 1);
        assert_eq!(again.snapshot.phase, TurnPhase::ShowingPrompt);
    }

    async fn hand_back_to(state: &SharedState, code: &str, actor: &str) {
        choose(state, "ana", code, PromptKind::Truth).await.unwrap();
        advance(state, "ana", code).await.unwrap();
        let view = draw(state, "ana", code).await.unwrap();
        assert_eq!(view.snapshot.acting.unwrap().id, actor);
        choose(state, "ana", code, PromptKind::Truth).await.unwrap();
    }

    #[tokio::test]
    async fn empty_catalog_skips_the_round_and_notifies_the_host() {
        let state = AppState::with_memory_store().await;
        let (room_id, code) = couple_room(&state, vec![Category::Act]).await;
        let mut host_events = state.rooms().room(room_id).host().subscribe();

        draw(&state, "ana", &code).await.unwrap();
        let view = choose(&state, "ana", &code, PromptKind::Dare).await.unwrap();

        assert_eq!(view.notice.as_deref(), Some(NO_PROMPT_NOTICE));
        assert_eq!((view.snapshot.round, view.snapshot.phase), (2, TurnPhase::Drawing));
        let event = host_events.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some(TURN_NOTICE));
    }

    #[tokio::test]
    async fn only_the_host_drives_an_in_game_room() {
        let state = AppState::with_memory_store().await;
        let (_, code) = couple_room(&state, vec![Category::Reveal]).await;

        let err = draw(&state, "bia", &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = advance(&state, "ana", &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        room_service::close(&state, "ana", &code).await.unwrap();
        let err = view(&state, "ana", &code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn lost_sessions_resume_from_the_stored_snapshot() {
        let state = AppState::with_memory_store().await;
        let (room_id, code) = couple_room(&state, vec![Category::Reveal]).await;
        let drawn = draw(&state, "ana", &code).await.unwrap();

        state.drop_session(room_id);
        let resumed = view(&state, "ana", &code).await.unwrap();
        assert_eq!(resumed.snapshot.phase, TurnPhase::Choosing);
        assert_eq!(
            resumed.snapshot.acting.map(|player| player.id),
            drawn.snapshot.acting.map(|player| player.id)
        );
    }

    #[tokio::test]
    async fn spent_vetoes_survive_a_session_rebuild() {
        let state = AppState::with_memory_store().await;
        import_reveal_truths(&state).await;
        let (room_id, code) = couple_room(&state, vec![Category::Reveal]).await;

        let first = draw(&state, "ana", &code).await.unwrap().snapshot.acting.unwrap().id;
        choose(&state, "ana", &code, PromptKind::Truth).await.unwrap();
        let vetoed = veto(&state, "ana", &code).await.unwrap();
        assert_eq!(vetoed.counters.vetoes, 1);

        state.drop_session(room_id);
        let resumed = view(&state, "ana", &code).await.unwrap();
        assert_eq!(resumed.counters.vetoes, 1);
        assert_eq!(resumed.counters.categories.len(), 1);

        draw(&state, "ana", &code).await.unwrap();
        hand_back_to(&state, &code, &first).await;
        let again = veto(&state, "ana", &code).await.unwrap();
        assert!(again.veto_exhausted);
        assert!(!again.can_veto);

        state.drop_session(room_id);
        let closed = room_service::close(&state, "ana", &code).await.unwrap();
        let summary = closed.summary.unwrap();
        assert_eq!(summary.vetoes, 1);
        assert_eq!(summary.categories[0].count, 3);
    }
}
