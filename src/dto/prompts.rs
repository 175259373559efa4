//! Prompt import and cache maintenance payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::prompt_cache::CacheStats,
    dto::format_system_time,
    state::catalog::{Category, Mode, Participants, PromptKind},
};

/// One prompt row to import.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct PromptInput {
    /// Keeps an existing identifier; a fresh one is generated when omitted.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub mode: Mode,
    pub category: Category,
    #[validate(range(min = 1, max = 3))]
    pub level: u8,
    pub kind: PromptKind,
    /// Inferred from the partner placeholder when omitted.
    #[serde(default)]
    pub participants: Option<Participants>,
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

/// Body of `POST /prompts/import`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ImportPromptsRequest {
    #[validate(length(min = 1, max = 2000), nested)]
    pub prompts: Vec<PromptInput>,
}

/// Outcome of an import.
#[derive(Debug, Serialize, ToSchema)]
pub struct ImportPromptsResponse {
    pub received: usize,
    /// Rows that were not already stored.
    pub inserted: usize,
}

/// Contents of the offline prompt cache.
#[derive(Debug, Serialize, ToSchema)]
pub struct CacheStatsResponse {
    pub total: usize,
    pub group: usize,
    pub couple: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<String>,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            total: stats.total,
            group: stats.group,
            couple: stats.couple,
            oldest: stats.oldest.map(format_system_time),
        }
    }
}
