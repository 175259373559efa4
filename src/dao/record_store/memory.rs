use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use super::RecordStore;
use crate::dao::{
    models::{
        FavoriteEntity, MembershipEntity, PreferenceEntity, PromptEntity, PromptQuery, RoomEntity,
        RoomUpdate, UserEntity,
    },
    storage::{StorageError, StorageResult},
};
use crate::state::catalog::{Category, Mode, PlayerId};

/// Process-local record store. Used when no database is configured and in tests.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<PlayerId, UserEntity>,
    rooms: DashMap<Uuid, RoomEntity>,
    codes: DashMap<String, Uuid>,
    members: DashMap<(Uuid, PlayerId), MembershipEntity>,
    preferences: DashMap<(PlayerId, Mode, Category), PreferenceEntity>,
    prompts: DashMap<Uuid, PromptEntity>,
    favorites: DashMap<(PlayerId, Uuid), FavoriteEntity>,
}

impl MemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_room_sync(&self, room: RoomEntity) -> StorageResult<()> {
        match self.inner.codes.entry(room.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict { key: "room code" }),
            Entry::Vacant(slot) => {
                slot.insert(room.id);
                self.inner.rooms.insert(room.id, room);
                Ok(())
            }
        }
    }

    fn find_room_by_code_sync(&self, code: &str) -> Option<RoomEntity> {
        let id = *self.inner.codes.get(code)?;
        self.inner.rooms.get(&id).map(|room| room.clone())
    }

    fn update_room_sync(&self, id: Uuid, update: RoomUpdate) -> StorageResult<Option<RoomEntity>> {
        let Some(mut room) = self.inner.rooms.get_mut(&id) else {
            return Ok(None);
        };
        if !update.admits(&room) {
            return Err(StorageError::StaleWrite { key: "room status" });
        }
        update.apply_to(&mut room);
        Ok(Some(room.clone()))
    }

    fn upsert_member_sync(&self, member: MembershipEntity) -> bool {
        match self
            .inner
            .members
            .entry((member.room_id, member.player_id.clone()))
        {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(member);
                true
            }
        }
    }

    fn list_members_sync(&self, room_id: Uuid) -> Vec<MembershipEntity> {
        let mut members = self
            .inner
            .members
            .iter()
            .filter(|entry| entry.room_id == room_id)
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        members
    }

    fn find_prompts_sync(&self, query: PromptQuery) -> Vec<PromptEntity> {
        let mut prompts = self
            .inner
            .prompts
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        prompts.sort_by_key(|prompt| prompt.id);
        prompts.truncate(query.limit);
        prompts
    }
}

impl RecordStore for MemoryRecordStore {
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.users.insert(user.id.clone(), user);
            Ok(())
        })
    }

    fn find_users(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(ids
                .iter()
                .filter_map(|id| store.inner.users.get(id).map(|user| user.clone()))
                .collect())
        })
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room_sync(room) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rooms.get(&id).map(|room| room.clone())) })
    }

    fn find_room_by_code(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_room_by_code_sync(&code)) })
    }

    fn update_room(
        &self,
        id: Uuid,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.update_room_sync(id, update) })
    }

    fn upsert_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.upsert_member_sync(member)) })
    }

    fn list_members(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_members_sync(room_id)) })
    }

    fn upsert_preference(&self, preference: PreferenceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (
                preference.player_id.clone(),
                preference.mode,
                preference.category,
            );
            store.inner.preferences.insert(key, preference);
            Ok(())
        })
    }

    fn find_preferences(
        &self,
        ids: Vec<PlayerId>,
        mode: Mode,
    ) -> BoxFuture<'static, StorageResult<Vec<PreferenceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .preferences
                .iter()
                .filter(|entry| entry.mode == mode && ids.contains(&entry.player_id))
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn insert_prompts(&self, prompts: Vec<PromptEntity>) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inserted = 0;
            for prompt in prompts {
                if let Entry::Vacant(slot) = store.inner.prompts.entry(prompt.id) {
                    slot.insert(prompt);
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_prompts_sync(query)) })
    }

    fn prompt_exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.prompts.contains_key(&id)) })
    }

    fn set_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (favorite.player_id.clone(), favorite.prompt_id);
            store.inner.favorites.insert(key, favorite);
            Ok(())
        })
    }

    fn remove_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (favorite.player_id, favorite.prompt_id);
            Ok(store.inner.favorites.remove(&key).is_some())
        })
    }

    fn list_favorites(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<FavoriteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .favorites
                .iter()
                .filter(|entry| ids.contains(&entry.player_id))
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::{
        catalog::{IntensityLevel, Participants, PromptKind, SessionKind},
        room::RoomStatus,
    };

    fn room(code: &str) -> RoomEntity {
        RoomEntity {
            id: Uuid::new_v4(),
            code: code.into(),
            host_id: "host".into(),
            mode: Mode::Group,
            session_kind: SessionKind::Online,
            status: RoomStatus::Waiting,
            fictional_players: Vec::new(),
            active_categories: Mode::Group.categories().to_vec(),
            punishment: None,
            escalation: false,
            turn_snapshot: None,
            session_ledger: None,
            summary: None,
            created_at: SystemTime::now(),
            ended_at: None,
        }
    }

    fn prompt(level: IntensityLevel, kind: PromptKind) -> PromptEntity {
        PromptEntity {
            id: Uuid::new_v4(),
            mode: Mode::Group,
            category: Category::Touch,
            level,
            kind,
            participants: Participants::Solo,
            text: "text".into(),
        }
    }

    #[tokio::test]
    async fn joining_twice_keeps_one_membership() {
        let store = MemoryRecordStore::new();
        let room_id = Uuid::new_v4();
        let member = MembershipEntity {
            room_id,
            player_id: "ana".into(),
            joined_at: SystemTime::now(),
        };

        assert!(store.upsert_member(member.clone()).await.unwrap());
        assert!(!store.upsert_member(member).await.unwrap());
        assert_eq!(store.list_members(room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn room_codes_are_unique() {
        let store = MemoryRecordStore::new();
        store.insert_room(room("ABCDEF")).await.unwrap();

        let err = store.insert_room(room("ABCDEF")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert!(store.find_room_by_code("ABCDEF".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_room_applies_set_fields_only() {
        let store = MemoryRecordStore::new();
        let stored = room("QWERTY");
        store.insert_room(stored.clone()).await.unwrap();

        let updated = store
            .update_room(
                stored.id,
                RoomUpdate {
                    status: Some(RoomStatus::InGame),
                    ..RoomUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, RoomStatus::InGame);
        assert_eq!(updated.active_categories, stored.active_categories);
        assert!(store.update_room(Uuid::new_v4(), RoomUpdate::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn guarded_status_write_rejects_a_changed_room() {
        let store = MemoryRecordStore::new();
        let stored = room("ZXCVBN");
        store.insert_room(stored.clone()).await.unwrap();

        let close = RoomUpdate {
            expected_status: Some(RoomStatus::Waiting),
            status: Some(RoomStatus::Ended),
            ..RoomUpdate::default()
        };
        store.update_room(stored.id, close).await.unwrap();

        let start = RoomUpdate {
            expected_status: Some(RoomStatus::Waiting),
            status: Some(RoomStatus::InGame),
            ..RoomUpdate::default()
        };
        let err = store.update_room(stored.id, start).await.unwrap_err();
        assert!(matches!(err, StorageError::StaleWrite { .. }));

        let current = store.find_room(stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, RoomStatus::Ended);
    }

    #[tokio::test]
    async fn preferences_upsert_by_player_mode_category() {
        let store = MemoryRecordStore::new();
        for level in [IntensityLevel::Light, IntensityLevel::Intense] {
            store
                .upsert_preference(PreferenceEntity {
                    player_id: "ana".into(),
                    mode: Mode::Group,
                    category: Category::Kiss,
                    level,
                })
                .await
                .unwrap();
        }

        let stored = store
            .find_preferences(vec!["ana".into()], Mode::Group)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].level, IntensityLevel::Intense);
        assert!(store.find_preferences(vec!["ana".into()], Mode::Couple).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_query_filters_and_limits() {
        let store = MemoryRecordStore::new();
        let rows = vec![
            prompt(IntensityLevel::Light, PromptKind::Dare),
            prompt(IntensityLevel::Medium, PromptKind::Dare),
            prompt(IntensityLevel::Intense, PromptKind::Dare),
            prompt(IntensityLevel::Light, PromptKind::Truth),
        ];
        assert_eq!(store.insert_prompts(rows.clone()).await.unwrap(), 4);
        assert_eq!(store.insert_prompts(rows).await.unwrap(), 0);

        let mut query = PromptQuery {
            mode: Mode::Group,
            category: Category::Touch,
            kind: PromptKind::Dare,
            max_level: Some(IntensityLevel::Medium),
            limit: 20,
        };
        let capped = store.find_prompts(query).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert!(capped.iter().all(|p| p.level <= IntensityLevel::Medium));

        query.max_level = None;
        query.limit = 1;
        assert_eq!(store.find_prompts(query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn favorites_toggle() {
        let store = MemoryRecordStore::new();
        let favorite = FavoriteEntity {
            player_id: "ana".into(),
            prompt_id: Uuid::new_v4(),
        };
        store.set_favorite(favorite.clone()).await.unwrap();
        store.set_favorite(favorite.clone()).await.unwrap();
        assert_eq!(store.list_favorites(vec!["ana".into()]).await.unwrap().len(), 1);

        assert!(store.remove_favorite(favorite.clone()).await.unwrap());
        assert!(!store.remove_favorite(favorite).await.unwrap());
    }
}
