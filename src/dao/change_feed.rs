//! Row-level change notifications for rooms.
//!
//! [`NotifyingStore`] wraps any [`RecordStore`] and publishes a [`RecordChange`]
//! on the room's channel after each successful room update or new membership.
//! Delivery is per room and in commit order; subscribers that lag skip ahead.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{
        FavoriteEntity, MembershipEntity, PreferenceEntity, PromptEntity, PromptQuery, RoomEntity,
        RoomUpdate, UserEntity,
    },
    record_store::RecordStore,
    storage::StorageResult,
};
use crate::state::catalog::{Mode, PlayerId};

const CHANNEL_CAPACITY: usize = 32;

/// Change event delivered to room subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// The room row was updated; carries the full new row.
    RoomUpdated(Box<RoomEntity>),
    /// A membership row was inserted.
    MemberJoined {
        /// Room joined.
        room_id: Uuid,
        /// New member.
        player_id: PlayerId,
    },
}

/// Per-room broadcast channels of [`RecordChange`]s.
#[derive(Default)]
pub struct ChangeFeed {
    channels: DashMap<Uuid, broadcast::Sender<RecordChange>>,
}

impl ChangeFeed {
    /// Empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of `room_id`. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<RecordChange> {
        self.channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish a change; rooms without subscribers are dropped from the registry.
    pub fn publish(&self, room_id: Uuid, change: RecordChange) {
        let delivered = self
            .channels
            .get(&room_id)
            .map(|sender| sender.send(change).is_ok());
        if delivered == Some(false) {
            self.channels
                .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
        }
    }
}

/// [`RecordStore`] decorator publishing room changes to a [`ChangeFeed`].
#[derive(Clone)]
pub struct NotifyingStore {
    inner: Arc<dyn RecordStore>,
    feed: Arc<ChangeFeed>,
}

impl NotifyingStore {
    /// Wrap `inner`, publishing to `feed`.
    pub fn new(inner: Arc<dyn RecordStore>, feed: Arc<ChangeFeed>) -> Self {
        Self { inner, feed }
    }
}

impl RecordStore for NotifyingStore {
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.upsert_user(user)
    }

    fn find_users(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        self.inner.find_users(ids)
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_room(room)
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.find_room(id)
    }

    fn find_room_by_code(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.find_room_by_code(code)
    }

    fn update_room(
        &self,
        id: Uuid,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let pending = self.inner.update_room(id, update);
        let feed = self.feed.clone();
        Box::pin(async move {
            let updated = pending.await?;
            if let Some(room) = &updated {
                feed.publish(id, RecordChange::RoomUpdated(Box::new(room.clone())));
            }
            Ok(updated)
        })
    }

    fn upsert_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let room_id = member.room_id;
        let player_id = member.player_id.clone();
        let pending = self.inner.upsert_member(member);
        let feed = self.feed.clone();
        Box::pin(async move {
            let inserted = pending.await?;
            if inserted {
                feed.publish(room_id, RecordChange::MemberJoined { room_id, player_id });
            }
            Ok(inserted)
        })
    }

    fn list_members(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        self.inner.list_members(room_id)
    }

    fn upsert_preference(&self, preference: PreferenceEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.upsert_preference(preference)
    }

    fn find_preferences(
        &self,
        ids: Vec<PlayerId>,
        mode: Mode,
    ) -> BoxFuture<'static, StorageResult<Vec<PreferenceEntity>>> {
        self.inner.find_preferences(ids, mode)
    }

    fn insert_prompts(&self, prompts: Vec<PromptEntity>) -> BoxFuture<'static, StorageResult<usize>> {
        self.inner.insert_prompts(prompts)
    }

    fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        self.inner.find_prompts(query)
    }

    fn prompt_exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.prompt_exists(id)
    }

    fn set_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.set_favorite(favorite)
    }

    fn remove_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.remove_favorite(favorite)
    }

    fn list_favorites(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<FavoriteEntity>>> {
        self.inner.list_favorites(ids)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::record_store::memory::MemoryRecordStore;

    fn member(room_id: Uuid, player: &str) -> MembershipEntity {
        MembershipEntity {
            room_id,
            player_id: player.into(),
            joined_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn new_members_are_published_once() {
        let feed = Arc::new(ChangeFeed::new());
        let store = NotifyingStore::new(Arc::new(MemoryRecordStore::new()), feed.clone());
        let room_id = Uuid::new_v4();
        let mut rx = feed.subscribe(room_id);

        store.upsert_member(member(room_id, "ana")).await.unwrap();
        store.upsert_member(member(room_id, "ana")).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            RecordChange::MemberJoined {
                room_id,
                player_id: "ana".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn other_rooms_are_not_delivered() {
        let feed = ChangeFeed::new();
        let (watched, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx = feed.subscribe(watched);

        feed.publish(
            other,
            RecordChange::MemberJoined {
                room_id: other,
                player_id: "bia".into(),
            },
        );
        assert!(rx.try_recv().is_err());
    }
}
