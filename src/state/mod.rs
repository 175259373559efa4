/// Modes, categories, intensity levels and prompts.
pub mod catalog;
/// Escalating intensity cap.
pub mod escalation;
/// Favorites pool and weighted draw.
pub mod favorites;
/// Preference index.
pub mod preferences;
/// Room lifecycle.
pub mod room;
/// Host-owned live session.
pub mod session;
mod sse;
/// Commit-then-replicate helpers for turn transitions.
pub mod transitions;
/// Turn state machine.
pub mod turn;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        change_feed::{ChangeFeed, NotifyingStore},
        prompt_cache::{MemoryPromptCache, PromptCache},
        record_store::RecordStore,
    },
    error::ServiceError,
    state::session::HostSession,
};

pub use self::sse::{RoomChannels, RoomHubs, SseHub};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Host session guarded for serialized access.
pub type SessionHandle = Arc<Mutex<HostSession>>;

/// Central application state: storage handle, live sessions and broadcast channels.
pub struct AppState {
    store: RwLock<Option<Arc<dyn RecordStore>>>,
    changes: Arc<ChangeFeed>,
    rooms: RoomHubs,
    sessions: DashMap<Uuid, SessionHandle>,
    membership_polls: DashMap<Uuid, ()>,
    prompt_cache: Arc<dyn PromptCache>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            changes: Arc::new(ChangeFeed::new()),
            rooms: RoomHubs::new(32, 16, config.reaction_window),
            sessions: DashMap::new(),
            membership_polls: DashMap::new(),
            prompt_cache: Arc::new(MemoryPromptCache::new()),
            degraded: degraded_tx,
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current record store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn RecordStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current record store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn RecordStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a record store, wrapped so room changes reach subscribers, and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn RecordStore>) {
        let notifying: Arc<dyn RecordStore> =
            Arc::new(NotifyingStore::new(store, self.changes.clone()));
        {
            let mut guard = self.store.write().await;
            *guard = Some(notifying);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Per-room change notifications.
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    /// Per-room SSE channels.
    pub fn rooms(&self) -> &RoomHubs {
        &self.rooms
    }

    /// Live host session of `room_id`, if one is loaded.
    pub fn session(&self, room_id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&room_id).map(|entry| entry.clone())
    }

    /// Register the live session of `room_id`, keeping an existing one if present.
    pub fn install_session(&self, room_id: Uuid, session: HostSession) -> SessionHandle {
        self.sessions
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone()
    }

    /// Number of rooms with a live session in this process.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Forget the live session of `room_id`.
    pub fn drop_session(&self, room_id: Uuid) {
        self.sessions.remove(&room_id);
    }

    /// Claim the membership poller slot of `room_id`. Returns `false` when one already runs.
    pub fn claim_membership_poll(&self, room_id: Uuid) -> bool {
        self.membership_polls.insert(room_id, ()).is_none()
    }

    /// Release the membership poller slot of `room_id`.
    pub fn release_membership_poll(&self, room_id: Uuid) {
        self.membership_polls.remove(&room_id);
    }

    /// Offline prompt cache.
    pub fn prompt_cache(&self) -> Arc<dyn PromptCache> {
        self.prompt_cache.clone()
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by a fresh in-memory store.
    pub(crate) async fn with_memory_store() -> SharedState {
        let state = Self::new(AppConfig::default());
        state
            .set_store(Arc::new(
                crate::dao::record_store::memory::MemoryRecordStore::new(),
            ))
            .await;
        state
    }
}
