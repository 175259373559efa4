use std::{collections::VecDeque, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::dto::{sse::ServerEvent, ws::ReactionView};

/// Per-room SSE channels, created lazily on first use.
pub struct RoomHubs {
    rooms: DashMap<Uuid, Arc<RoomChannels>>,
    public_capacity: usize,
    host_capacity: usize,
    reaction_window: usize,
}

impl RoomHubs {
    /// Build the registry with per-stream channel capacities and the reaction window size.
    pub fn new(public_capacity: usize, host_capacity: usize, reaction_window: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            public_capacity,
            host_capacity,
            reaction_window,
        }
    }

    /// Channels of `room_id`, created on first access.
    pub fn room(&self, room_id: Uuid) -> Arc<RoomChannels> {
        self.rooms
            .entry(room_id)
            .or_insert_with(|| {
                Arc::new(RoomChannels::new(
                    self.public_capacity,
                    self.host_capacity,
                    self.reaction_window,
                ))
            })
            .clone()
    }

    /// Forget a room's channels once it ended.
    pub fn remove(&self, room_id: Uuid) {
        self.rooms.remove(&room_id);
    }
}

/// Broadcast hubs of a single room plus the host's rolling reaction window.
pub struct RoomChannels {
    public: SseHub,
    host: SseHub,
    reactions: Mutex<VecDeque<ReactionView>>,
    window: usize,
}

impl RoomChannels {
    fn new(public_capacity: usize, host_capacity: usize, window: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            host: SseHub::new(host_capacity),
            reactions: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    /// Hub every participant listens to.
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    /// Hub only the host listens to.
    pub fn host(&self) -> &SseHub {
        &self.host
    }

    /// Push a reaction, evicting the oldest beyond the window.
    pub async fn record_reaction(&self, reaction: ReactionView) {
        let mut window = self.reactions.lock().await;
        window.push_back(reaction);
        while window.len() > self.window {
            window.pop_front();
        }
    }

    /// Most recent reactions, oldest first.
    pub async fn recent_reactions(&self) -> Vec<ReactionView> {
        self.reactions.lock().await.iter().cloned().collect()
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(emoji: &str) -> ReactionView {
        ReactionView {
            emoji: emoji.into(),
            player_id: None,
            sent_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn reaction_window_keeps_latest() {
        let hubs = RoomHubs::new(4, 4, 2);
        let room = hubs.room(Uuid::new_v4());
        for emoji in ["🔥", "😂", "😱"] {
            room.record_reaction(reaction(emoji)).await;
        }

        let recent = room.recent_reactions().await;
        let emojis = recent.iter().map(|r| r.emoji.as_str()).collect::<Vec<_>>();
        assert_eq!(emojis, ["😂", "😱"]);
    }

    #[test]
    fn rooms_are_shared_per_id() {
        let hubs = RoomHubs::new(4, 4, 2);
        let id = Uuid::new_v4();
        let first = hubs.room(id);
        let _rx = first.public().subscribe();

        assert_eq!(hubs.room(id).public().subscribers(), 1);

        hubs.remove(id);
        assert_eq!(hubs.room(id).public().subscribers(), 0);
    }
}
