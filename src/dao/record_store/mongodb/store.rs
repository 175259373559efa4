use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoFavoriteDocument, MongoMemberDocument, MongoPreferenceDocument, MongoPromptDocument,
        MongoRoomDocument, MongoUserDocument, level_value, room_update_fields,
    },
};
use crate::dao::{
    models::{
        FavoriteEntity, MembershipEntity, PreferenceEntity, PromptEntity, PromptQuery, RoomEntity,
        RoomUpdate, UserEntity,
    },
    record_store::RecordStore,
    storage::StorageResult,
};
use crate::state::catalog::{Mode, PlayerId};

const USERS: &str = "users";
const ROOMS: &str = "rooms";
const MEMBERS: &str = "room_members";
const PREFERENCES: &str = "preferences";
const PROMPTS: &str = "prompts";
const FAVORITES: &str = "favorites";

/// Record store backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoRecordStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoRecordStore {
    /// Connect to MongoDB and ensure the unique indexes behind every upsert key.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, &'static str, Document); 4] = [
            (ROOMS, "room_code_idx", doc! { "code": 1 }),
            (MEMBERS, "member_room_player_idx", doc! { "room_id": 1, "player_id": 1 }),
            (
                PREFERENCES,
                "preference_player_mode_category_idx",
                doc! { "player_id": 1, "mode": 1, "category": 1 },
            ),
            (FAVORITES, "favorite_player_prompt_idx", doc! { "player_id": 1, "prompt_id": 1 }),
        ];

        let database = self.database().await;
        for (collection, name, keys) in indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(true))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.database.read().await.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn upsert_user(&self, user: UserEntity) -> MongoResult<()> {
        let collection = self.collection::<MongoUserDocument>(USERS).await;
        let filter = doc! { "_id": user.id.as_str() };
        collection
            .replace_one(filter, MongoUserDocument::from(user))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::operation("upsert user", USERS, source))?;
        Ok(())
    }

    async fn find_users(&self, ids: Vec<PlayerId>) -> MongoResult<Vec<UserEntity>> {
        let collection = self.collection::<MongoUserDocument>(USERS).await;
        let documents: Vec<MongoUserDocument> = collection
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(|source| MongoDaoError::operation("find users", USERS, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::operation("find users", USERS, source))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let collection = self.collection::<MongoRoomDocument>(ROOMS).await;
        collection
            .insert_one(MongoRoomDocument::from(room))
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateKey { key: "room code" }
                } else {
                    MongoDaoError::operation("insert room", ROOMS, source)
                }
            })?;
        Ok(())
    }

    async fn find_room_where(&self, filter: Document) -> MongoResult<Option<RoomEntity>> {
        let collection = self.collection::<MongoRoomDocument>(ROOMS).await;
        let document = collection
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::operation("load room", ROOMS, source))?;

        document
            .map(RoomEntity::try_from)
            .transpose()
            .map_err(|source| MongoDaoError::CorruptId {
                collection: ROOMS,
                source,
            })
    }

    async fn update_room(&self, id: Uuid, update: RoomUpdate) -> MongoResult<Option<RoomEntity>> {
        let by_id = doc! { "_id": id.to_string() };
        let fields = room_update_fields(&update).map_err(|source| MongoDaoError::Encode {
            field: "room update",
            collection: ROOMS,
            source,
        })?;

        let mut filter = by_id.clone();
        if let Some(expected) = update.expected_status {
            filter.insert("status", expected.as_str());
        }
        if fields.is_empty() {
            return self.find_room_where(filter).await;
        }

        let collection = self.collection::<MongoRoomDocument>(ROOMS).await;
        let document = collection
            .find_one_and_update(filter, doc! { "$set": fields })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::operation("update room", ROOMS, source))?;

        match document {
            Some(document) => RoomEntity::try_from(document)
                .map(Some)
                .map_err(|source| MongoDaoError::CorruptId {
                    collection: ROOMS,
                    source,
                }),
            None if update.expected_status.is_some() => {
                match self.find_room_where(by_id).await? {
                    Some(_) => Err(MongoDaoError::StaleWrite { key: "room status" }),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    async fn upsert_member(&self, member: MembershipEntity) -> MongoResult<bool> {
        let collection = self.collection::<Document>(MEMBERS).await;
        let result = collection
            .update_one(
                doc! { "room_id": member.room_id.to_string(), "player_id": member.player_id.as_str() },
                doc! { "$setOnInsert": { "joined_at": DateTime::from_system_time(member.joined_at) } },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::operation("upsert member", MEMBERS, source))?;
        Ok(result.upserted_id.is_some())
    }

    async fn list_members(&self, room_id: Uuid) -> MongoResult<Vec<MembershipEntity>> {
        let collection = self.collection::<MongoMemberDocument>(MEMBERS).await;
        let documents: Vec<MongoMemberDocument> = collection
            .find(doc! { "room_id": room_id.to_string() })
            .sort(doc! { "joined_at": 1, "player_id": 1 })
            .await
            .map_err(|source| MongoDaoError::operation("list members", MEMBERS, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::operation("list members", MEMBERS, source))?;

        documents
            .into_iter()
            .map(MembershipEntity::try_from)
            .collect::<Result<_, _>>()
            .map_err(|source| MongoDaoError::CorruptId {
                collection: MEMBERS,
                source,
            })
    }

    async fn upsert_preference(&self, preference: PreferenceEntity) -> MongoResult<()> {
        let collection = self.collection::<Document>(PREFERENCES).await;
        collection
            .update_one(
                doc! {
                    "player_id": preference.player_id.as_str(),
                    "mode": preference.mode.as_str(),
                    "category": preference.category.as_str(),
                },
                doc! { "$set": { "level": level_value(preference.level) } },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::operation("upsert preference", PREFERENCES, source))?;
        Ok(())
    }

    async fn find_preferences(&self, ids: Vec<PlayerId>, mode: Mode) -> MongoResult<Vec<PreferenceEntity>> {
        let collection = self.collection::<MongoPreferenceDocument>(PREFERENCES).await;
        let documents: Vec<MongoPreferenceDocument> = collection
            .find(doc! { "player_id": { "$in": ids }, "mode": mode.as_str() })
            .await
            .map_err(|source| MongoDaoError::operation("find preferences", PREFERENCES, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::operation("find preferences", PREFERENCES, source))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_prompts(&self, prompts: Vec<PromptEntity>) -> MongoResult<usize> {
        let collection = self.collection::<Document>(PROMPTS).await;
        let mut inserted = 0;
        for prompt in prompts {
            let result = collection
                .update_one(
                    doc! { "_id": prompt.id.to_string() },
                    doc! { "$setOnInsert": {
                        "mode": prompt.mode.as_str(),
                        "category": prompt.category.as_str(),
                        "level": level_value(prompt.level),
                        "kind": prompt.kind.as_str(),
                        "participants": prompt.participants.as_str(),
                        "text": prompt.text.as_str(),
                    } },
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::operation("insert prompt", PROMPTS, source))?;
            if result.upserted_id.is_some() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_prompts(&self, query: PromptQuery) -> MongoResult<Vec<PromptEntity>> {
        let mut filter = doc! {
            "mode": query.mode.as_str(),
            "category": query.category.as_str(),
            "kind": query.kind.as_str(),
        };
        if let Some(max) = query.max_level {
            filter.insert("level", doc! { "$lte": level_value(max) });
        }

        let collection = self.collection::<MongoPromptDocument>(PROMPTS).await;
        let documents: Vec<MongoPromptDocument> = collection
            .find(filter)
            .limit(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::operation("find prompts", PROMPTS, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::operation("find prompts", PROMPTS, source))?;

        documents
            .into_iter()
            .map(PromptEntity::try_from)
            .collect::<Result<_, _>>()
            .map_err(|source| MongoDaoError::CorruptId {
                collection: PROMPTS,
                source,
            })
    }

    async fn prompt_exists(&self, id: Uuid) -> MongoResult<bool> {
        let collection = self.collection::<Document>(PROMPTS).await;
        let count = collection
            .count_documents(doc! { "_id": id.to_string() })
            .await
            .map_err(|source| MongoDaoError::operation("count prompts", PROMPTS, source))?;
        Ok(count > 0)
    }

    async fn set_favorite(&self, favorite: FavoriteEntity) -> MongoResult<()> {
        let collection = self.collection::<Document>(FAVORITES).await;
        let marked_at = DateTime::from_system_time(SystemTime::now());
        collection
            .update_one(
                doc! { "player_id": favorite.player_id.as_str(), "prompt_id": favorite.prompt_id.to_string() },
                doc! { "$setOnInsert": { "created_at": marked_at } },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::operation("set favorite", FAVORITES, source))?;
        Ok(())
    }

    async fn remove_favorite(&self, favorite: FavoriteEntity) -> MongoResult<bool> {
        let collection = self.collection::<Document>(FAVORITES).await;
        let result = collection
            .delete_one(
                doc! { "player_id": favorite.player_id.as_str(), "prompt_id": favorite.prompt_id.to_string() },
            )
            .await
            .map_err(|source| MongoDaoError::operation("remove favorite", FAVORITES, source))?;
        Ok(result.deleted_count > 0)
    }

    async fn list_favorites(&self, ids: Vec<PlayerId>) -> MongoResult<Vec<FavoriteEntity>> {
        let collection = self.collection::<MongoFavoriteDocument>(FAVORITES).await;
        let documents: Vec<MongoFavoriteDocument> = collection
            .find(doc! { "player_id": { "$in": ids } })
            .await
            .map_err(|source| MongoDaoError::operation("list favorites", FAVORITES, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::operation("list favorites", FAVORITES, source))?;

        documents
            .into_iter()
            .map(|document| {
                Ok(FavoriteEntity {
                    prompt_id: Uuid::parse_str(&document.prompt_id)?,
                    player_id: document.player_id,
                })
            })
            .collect::<Result<_, uuid::Error>>()
            .map_err(|source| MongoDaoError::CorruptId {
                collection: FAVORITES,
                source,
            })
    }
}

impl RecordStore for MongoRecordStore {
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_user(user).await.map_err(Into::into) })
    }

    fn find_users(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_users(ids).await.map_err(Into::into) })
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_room_where(doc! { "_id": id.to_string() })
                .await
                .map_err(Into::into)
        })
    }

    fn find_room_by_code(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_room_where(doc! { "code": code })
                .await
                .map_err(Into::into)
        })
    }

    fn update_room(
        &self,
        id: Uuid,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.update_room(id, update).await.map_err(Into::into) })
    }

    fn upsert_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_member(member).await.map_err(Into::into) })
    }

    fn list_members(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_members(room_id).await.map_err(Into::into) })
    }

    fn upsert_preference(&self, preference: PreferenceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_preference(preference).await.map_err(Into::into) })
    }

    fn find_preferences(
        &self,
        ids: Vec<PlayerId>,
        mode: Mode,
    ) -> BoxFuture<'static, StorageResult<Vec<PreferenceEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_preferences(ids, mode).await.map_err(Into::into) })
    }

    fn insert_prompts(&self, prompts: Vec<PromptEntity>) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move { store.insert_prompts(prompts).await.map_err(Into::into) })
    }

    fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_prompts(query).await.map_err(Into::into) })
    }

    fn prompt_exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.prompt_exists(id).await.map_err(Into::into) })
    }

    fn set_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.set_favorite(favorite).await.map_err(Into::into) })
    }

    fn remove_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove_favorite(favorite).await.map_err(Into::into) })
    }

    fn list_favorites(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<FavoriteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_favorites(ids).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
