use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    catalog::{
        Category, IntensityLevel, Mode, Participants, Player, PlayerId, Prompt, PromptKind,
        SessionKind,
    },
    room::RoomStatus,
    session::{MatchSummary, SessionLedger, TurnSnapshot},
};

/// Public profile of an authenticated player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Externally issued identifier.
    pub id: PlayerId,
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar reference.
    pub avatar_url: Option<String>,
}

impl From<UserEntity> for Player {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
        }
    }
}

/// Locally declared participant of a solo session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FictionalPlayerEntity {
    /// Name shown during the match.
    pub name: String,
    /// Level applied to every category of the mode.
    pub level: IntensityLevel,
}

/// Stored room ("sala").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Six-character join code.
    pub code: String,
    /// Identity of the creator.
    pub host_id: PlayerId,
    /// Game mode.
    pub mode: Mode,
    /// Online or solo.
    pub session_kind: SessionKind,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Participants of a solo session.
    pub fictional_players: Vec<FictionalPlayerEntity>,
    /// Active-category allowlist, never empty.
    pub active_categories: Vec<Category>,
    /// Text appended to penalty prompts.
    pub punishment: Option<String>,
    /// Escalation flag.
    pub escalation: bool,
    /// Latest replicated turn state.
    pub turn_snapshot: Option<TurnSnapshot>,
    /// Vetoes and counters of the running match, written with each snapshot.
    pub session_ledger: Option<SessionLedger>,
    /// End-of-match counters.
    pub summary: Option<MatchSummary>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Time the room was closed.
    pub ended_at: Option<SystemTime>,
}

/// Partial room update; `None` fields are left untouched.
///
/// With `expected_status` set the write only lands while the stored status still
/// equals it; otherwise the store reports a stale write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomUpdate {
    /// Status the room must still have for the update to apply.
    pub expected_status: Option<RoomStatus>,
    /// New status.
    pub status: Option<RoomStatus>,
    /// New allowlist.
    pub active_categories: Option<Vec<Category>>,
    /// New punishment text; `Some(None)` clears it.
    pub punishment: Option<Option<String>>,
    /// New escalation flag.
    pub escalation: Option<bool>,
    /// New turn snapshot.
    pub turn_snapshot: Option<TurnSnapshot>,
    /// New session ledger.
    pub session_ledger: Option<SessionLedger>,
    /// Final summary.
    pub summary: Option<MatchSummary>,
    /// Close time.
    pub ended_at: Option<SystemTime>,
}

impl RoomUpdate {
    /// Whether the update may be applied to `room` as currently stored.
    pub fn admits(&self, room: &RoomEntity) -> bool {
        self.expected_status
            .is_none_or(|expected| expected == room.status)
    }

    /// Apply the set fields onto `room`.
    pub fn apply_to(self, room: &mut RoomEntity) {
        if let Some(status) = self.status {
            room.status = status;
        }
        if let Some(categories) = self.active_categories {
            room.active_categories = categories;
        }
        if let Some(punishment) = self.punishment {
            room.punishment = punishment;
        }
        if let Some(escalation) = self.escalation {
            room.escalation = escalation;
        }
        if let Some(snapshot) = self.turn_snapshot {
            room.turn_snapshot = Some(snapshot);
        }
        if let Some(ledger) = self.session_ledger {
            room.session_ledger = Some(ledger);
        }
        if let Some(summary) = self.summary {
            room.summary = Some(summary);
        }
        if let Some(ended_at) = self.ended_at {
            room.ended_at = Some(ended_at);
        }
    }
}

/// (room, player) membership row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipEntity {
    /// Room joined.
    pub room_id: Uuid,
    /// Joining player.
    pub player_id: PlayerId,
    /// Join time, used for ordering.
    pub joined_at: SystemTime,
}

/// Stored preference, unique per (player, mode, category).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferenceEntity {
    /// Owner.
    pub player_id: PlayerId,
    /// Mode of the category.
    pub mode: Mode,
    /// Category.
    pub category: Category,
    /// Maximum accepted intensity.
    pub level: IntensityLevel,
}

/// Stored prompt row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Mode.
    pub mode: Mode,
    /// Category.
    pub category: Category,
    /// Intensity.
    pub level: IntensityLevel,
    /// Truth or dare.
    pub kind: PromptKind,
    /// Participant requirement.
    pub participants: Participants,
    /// Text body.
    pub text: String,
}

impl From<PromptEntity> for Prompt {
    fn from(value: PromptEntity) -> Self {
        Self {
            id: value.id,
            mode: value.mode,
            category: value.category,
            level: value.level,
            kind: value.kind,
            participants: value.participants,
            text: value.text,
        }
    }
}

impl From<Prompt> for PromptEntity {
    fn from(value: Prompt) -> Self {
        Self {
            id: value.id,
            mode: value.mode,
            category: value.category,
            level: value.level,
            kind: value.kind,
            participants: value.participants,
            text: value.text,
        }
    }
}

/// Favorite marking, unique per (player, prompt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteEntity {
    /// Owner.
    pub player_id: PlayerId,
    /// Favorited prompt.
    pub prompt_id: Uuid,
}

/// Store-side prompt filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptQuery {
    /// Mode.
    pub mode: Mode,
    /// Category.
    pub category: Category,
    /// Truth or dare.
    pub kind: PromptKind,
    /// Inclusive intensity ceiling; `None` for the whole pool.
    pub max_level: Option<IntensityLevel>,
    /// Maximum number of rows returned.
    pub limit: usize,
}

impl PromptQuery {
    /// Whether `prompt` satisfies the filter (ignoring the limit).
    pub fn matches(&self, prompt: &PromptEntity) -> bool {
        prompt.mode == self.mode
            && prompt.category == self.category
            && prompt.kind == self.kind
            && self.max_level.is_none_or(|max| prompt.level <= max)
    }
}
