//! Turn actions and the host's view of the live session.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{catalog::LevelView, player::PlayerView, ws::ReactionView},
    state::{
        catalog::{Category, PromptKind},
        session::{CategoryCount, MatchSummary, ShownPrompt, TurnSnapshot},
        turn::TurnPhase,
    },
};

/// Body of `POST /rooms/{code}/turn/choose`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChooseRequest {
    pub kind: PromptKind,
}

/// Prompt on screen.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShownPromptView {
    pub id: Uuid,
    pub category: Category,
    pub level: LevelView,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_seconds: Option<u32>,
}

impl From<&ShownPrompt> for ShownPromptView {
    fn from(prompt: &ShownPrompt) -> Self {
        Self {
            id: prompt.id,
            category: prompt.category,
            level: prompt.level.into(),
            text: prompt.text.clone(),
            timer_seconds: prompt.timer_seconds,
        }
    }
}

/// Replicated turn state as rendered by every participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TurnSnapshotView {
    pub phase: TurnPhase,
    pub round: u32,
    pub acting: Option<PlayerView>,
    pub partner: Option<PlayerView>,
    pub prompt: Option<ShownPromptView>,
    pub kind: Option<PromptKind>,
    pub is_penalty: bool,
}

impl From<&TurnSnapshot> for TurnSnapshotView {
    fn from(snapshot: &TurnSnapshot) -> Self {
        Self {
            phase: snapshot.phase,
            round: snapshot.round,
            acting: snapshot.acting.as_ref().map(PlayerView::from),
            partner: snapshot.partner.as_ref().map(PlayerView::from),
            prompt: snapshot.prompt.as_ref().map(ShownPromptView::from),
            kind: snapshot.kind,
            is_penalty: snapshot.is_penalty,
        }
    }
}

/// Play count of one category.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryCountView {
    pub category: Category,
    pub count: u32,
}

/// Match counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummaryView {
    /// Completed rounds.
    pub rounds: u32,
    pub skips: u32,
    pub penalties: u32,
    pub vetoes: u32,
    pub categories: Vec<CategoryCountView>,
}

impl From<&MatchSummary> for MatchSummaryView {
    fn from(summary: &MatchSummary) -> Self {
        Self {
            rounds: summary.rounds,
            skips: summary.skips,
            penalties: summary.penalties,
            vetoes: summary.vetoes,
            categories: summary
                .categories
                .iter()
                .map(|CategoryCount { category, count }| CategoryCountView {
                    category: *category,
                    count: *count,
                })
                .collect(),
        }
    }
}

/// Host view returned by every turn route.
#[derive(Debug, Serialize, ToSchema)]
pub struct TurnView {
    pub snapshot: TurnSnapshotView,
    /// Whether the acting player still holds their veto.
    pub can_veto: bool,
    /// Escalation cap of the current round, when escalation is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_level: Option<LevelView>,
    pub counters: MatchSummaryView,
    /// Most recent reactions, oldest first.
    pub recent_reactions: Vec<ReactionView>,
    /// Set when the round was skipped for lack of a compatible prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// Set when this action raised the escalation cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_up: Option<LevelView>,
    /// Set when a veto was requested by a player who already spent it.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub veto_exhausted: bool,
}
