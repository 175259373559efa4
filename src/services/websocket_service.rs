use std::time::SystemTime;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        ws::{ReactionInbound, ReactionView},
    },
    error::ServiceError,
    services::{room_service::find_room, sse_events},
    state::{RoomChannels, SharedState, catalog::PlayerId, room::RoomStatus},
};

/// Room a reaction socket is bound to.
#[derive(Debug, Clone)]
pub struct ReactionTarget {
    /// Room identifier.
    pub room_id: Uuid,
    /// Join code, for logs.
    pub code: String,
}

/// Resolve the room of a socket before upgrading. Ended rooms take no reactions.
pub async fn reaction_target(state: &SharedState, code: &str) -> Result<ReactionTarget, ServiceError> {
    let store = state.require_store().await?;
    let room = find_room(store.as_ref(), code).await?;
    if room.status == RoomStatus::Ended {
        return Err(ServiceError::InvalidState(format!(
            "room {} has ended",
            room.code
        )));
    }
    Ok(ReactionTarget {
        room_id: room.id,
        code: room.code,
    })
}

/// Handle the full lifecycle of a reaction WebSocket connection.
///
/// Reactions are fire-and-forget: nothing is persisted and nothing is acknowledged.
pub async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    target: ReactionTarget,
    player: Option<PlayerId>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps control frames flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let channels = state.rooms().room(target.room_id);
    info!(room = %target.code, player = ?player, "reaction socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ReactionInbound::from_json_str(&text) {
                Ok(ReactionInbound::Reaction { emoji }) => {
                    relay_reaction(&channels, emoji, player.clone()).await;
                }
                Ok(ReactionInbound::Unknown) => {
                    debug!(room = %target.code, "ignoring unknown socket message");
                }
                Err(err) => {
                    warn!(room = %target.code, error = %err, "discarding reaction");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room = %target.code, error = %err, "websocket error");
                break;
            }
        }
    }

    info!(room = %target.code, player = ?player, "reaction socket disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Stamp a reaction, keep it in the host's window and relay it to the room.
pub async fn relay_reaction(
    channels: &RoomChannels,
    emoji: String,
    player_id: Option<PlayerId>,
) -> ReactionView {
    let reaction = ReactionView {
        emoji,
        player_id,
        sent_at: format_system_time(SystemTime::now()),
    };
    channels.record_reaction(reaction.clone()).await;
    sse_events::broadcast_reaction(channels, &reaction);
    reaction
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::{room::CreateRoomRequest, sse::REACTION},
        services::room_service,
        state::{
            AppState,
            catalog::{Mode, SessionKind},
        },
    };

    #[tokio::test]
    async fn reactions_reach_the_room_and_the_host_window() {
        let state = AppState::with_memory_store().await;
        let channels = state.rooms().room(Uuid::new_v4());
        let mut rx = channels.public().subscribe();

        let sent = relay_reaction(&channels, "🔥".into(), Some("bia".into())).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some(REACTION));
        assert!(event.data.contains("🔥"));
        assert_eq!(channels.recent_reactions().await, [sent]);
    }

    #[tokio::test]
    async fn ended_rooms_refuse_sockets() {
        let state = AppState::with_memory_store().await;
        let view = room_service::create_room(
            &state,
            "ana",
            CreateRoomRequest {
                mode: Mode::Couple,
                session_kind: SessionKind::Online,
                fictional_players: Vec::new(),
            },
        )
        .await
        .unwrap();

        let target = reaction_target(&state, &view.code).await.unwrap();
        assert_eq!(target.room_id, view.id);

        room_service::close(&state, "ana", &view.code).await.unwrap();
        let err = reaction_target(&state, &view.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
