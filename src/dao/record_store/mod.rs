pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        FavoriteEntity, MembershipEntity, PreferenceEntity, PromptEntity, PromptQuery, RoomEntity,
        RoomUpdate, UserEntity,
    },
    storage::StorageResult,
};
use crate::state::catalog::{Mode, PlayerId};

/// Abstraction over the persistent record store shared by every room.
///
/// Upserts are keyed: users by id, memberships by (room, player), preferences by
/// (player, mode, category) and favorites by (player, prompt).
pub trait RecordStore: Send + Sync {
    /// Insert or replace a user profile.
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Profiles of the given players; unknown ids are skipped.
    fn find_users(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;

    /// Insert a new room. Fails with `Conflict` when the code is taken.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Room by id.
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Room by join code.
    fn find_room_by_code(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Apply a partial update and return the updated room, if it exists.
    fn update_room(
        &self,
        id: Uuid,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Upsert a membership row. Returns `true` when the row was new.
    fn upsert_member(&self, member: MembershipEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Members of a room in join order.
    fn list_members(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>>;

    /// Upsert a preference row.
    fn upsert_preference(&self, preference: PreferenceEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Preferences of exactly the given players for one mode.
    fn find_preferences(
        &self,
        ids: Vec<PlayerId>,
        mode: Mode,
    ) -> BoxFuture<'static, StorageResult<Vec<PreferenceEntity>>>;

    /// Insert prompt rows, returning how many were new.
    fn insert_prompts(&self, prompts: Vec<PromptEntity>) -> BoxFuture<'static, StorageResult<usize>>;
    /// Prompts matching the filter, up to its limit.
    fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>>;
    /// Whether a prompt with this id exists.
    fn prompt_exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Mark a prompt as favorite.
    fn set_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a favorite marking. Returns `true` when something was removed.
    fn remove_favorite(&self, favorite: FavoriteEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Favorites of the given players.
    fn list_favorites(&self, ids: Vec<PlayerId>) -> BoxFuture<'static, StorageResult<Vec<FavoriteEntity>>>;

    /// Cheap liveness check.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
