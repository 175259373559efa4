use mongodb::bson::{self, DateTime, Document, error::Error as BsonError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    FictionalPlayerEntity, MembershipEntity, PreferenceEntity, PromptEntity, RoomEntity, RoomUpdate,
    UserEntity,
};
use crate::state::{
    catalog::{Category, IntensityLevel, Mode, Participants, PromptKind, SessionKind},
    room::RoomStatus,
    session::{MatchSummary, SessionLedger, TurnSnapshot},
};

/// Error raised when a stored identifier is not a valid UUID.
pub type InvalidId = uuid::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: String,
    code: String,
    host_id: String,
    mode: Mode,
    session_kind: SessionKind,
    status: RoomStatus,
    #[serde(default)]
    fictional_players: Vec<FictionalPlayerEntity>,
    active_categories: Vec<Category>,
    punishment: Option<String>,
    #[serde(default)]
    escalation: bool,
    turn_snapshot: Option<TurnSnapshot>,
    #[serde(default)]
    session_ledger: Option<SessionLedger>,
    summary: Option<MatchSummary>,
    created_at: DateTime,
    ended_at: Option<DateTime>,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id.to_string(),
            code: value.code,
            host_id: value.host_id,
            mode: value.mode,
            session_kind: value.session_kind,
            status: value.status,
            fictional_players: value.fictional_players,
            active_categories: value.active_categories,
            punishment: value.punishment,
            escalation: value.escalation,
            turn_snapshot: value.turn_snapshot,
            session_ledger: value.session_ledger,
            summary: value.summary,
            created_at: DateTime::from_system_time(value.created_at),
            ended_at: value.ended_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoRoomDocument> for RoomEntity {
    type Error = InvalidId;

    fn try_from(value: MongoRoomDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            code: value.code,
            host_id: value.host_id,
            mode: value.mode,
            session_kind: value.session_kind,
            status: value.status,
            fictional_players: value.fictional_players,
            active_categories: value.active_categories,
            punishment: value.punishment,
            escalation: value.escalation,
            turn_snapshot: value.turn_snapshot,
            session_ledger: value.session_ledger,
            summary: value.summary,
            created_at: value.created_at.to_system_time(),
            ended_at: value.ended_at.map(DateTime::to_system_time),
        })
    }
}

/// `$set` body holding only the fields present in `update`.
pub fn room_update_fields(update: &RoomUpdate) -> Result<Document, BsonError> {
    let mut fields = Document::new();
    if let Some(status) = &update.status {
        fields.insert("status", bson::serialize_to_bson(status)?);
    }
    if let Some(categories) = &update.active_categories {
        fields.insert("active_categories", bson::serialize_to_bson(categories)?);
    }
    if let Some(punishment) = &update.punishment {
        fields.insert("punishment", bson::serialize_to_bson(punishment)?);
    }
    if let Some(escalation) = update.escalation {
        fields.insert("escalation", escalation);
    }
    if let Some(snapshot) = &update.turn_snapshot {
        fields.insert("turn_snapshot", bson::serialize_to_bson(snapshot)?);
    }
    if let Some(ledger) = &update.session_ledger {
        fields.insert("session_ledger", bson::serialize_to_bson(ledger)?);
    }
    if let Some(summary) = &update.summary {
        fields.insert("summary", bson::serialize_to_bson(summary)?);
    }
    if let Some(ended_at) = update.ended_at {
        fields.insert("ended_at", DateTime::from_system_time(ended_at));
    }
    Ok(fields)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMemberDocument {
    room_id: String,
    player_id: String,
    joined_at: DateTime,
}

impl TryFrom<MongoMemberDocument> for MembershipEntity {
    type Error = InvalidId;

    fn try_from(value: MongoMemberDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            room_id: Uuid::parse_str(&value.room_id)?,
            player_id: value.player_id,
            joined_at: value.joined_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPreferenceDocument {
    player_id: String,
    mode: Mode,
    category: Category,
    level: IntensityLevel,
}

impl From<MongoPreferenceDocument> for PreferenceEntity {
    fn from(value: MongoPreferenceDocument) -> Self {
        Self {
            player_id: value.player_id,
            mode: value.mode,
            category: value.category,
            level: value.level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPromptDocument {
    #[serde(rename = "_id")]
    id: String,
    mode: Mode,
    category: Category,
    level: IntensityLevel,
    kind: PromptKind,
    participants: Participants,
    text: String,
}

impl TryFrom<MongoPromptDocument> for PromptEntity {
    type Error = InvalidId;

    fn try_from(value: MongoPromptDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            mode: value.mode,
            category: value.category,
            level: value.level,
            kind: value.kind,
            participants: value.participants,
            text: value.text,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFavoriteDocument {
    pub player_id: String,
    pub prompt_id: String,
}

/// Level as stored: a 32-bit integer.
pub fn level_value(level: IntensityLevel) -> i32 {
    i32::from(level.as_u8())
}
