//! Static catalogue of modes, categories and intensity labels.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::catalog::{Category, IntensityLevel, Mode};

/// One intensity level and its display label.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LevelView {
    /// Numeric level in `0..=3`.
    pub level: u8,
    /// Display label ("Never", "Light", "Medium", "Intense").
    pub label: String,
}

impl From<IntensityLevel> for LevelView {
    fn from(level: IntensityLevel) -> Self {
        Self {
            level: level.as_u8(),
            label: level.label().to_string(),
        }
    }
}

/// Category metadata shown in settings screens.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryView {
    pub category: Category,
    /// Two-letter code.
    pub code: String,
    pub label: String,
    pub emoji: String,
}

impl From<Category> for CategoryView {
    fn from(category: Category) -> Self {
        Self {
            category,
            code: category.code().to_string(),
            label: category.label().to_string(),
            emoji: category.emoji().to_string(),
        }
    }
}

/// A mode, its headcount rule and its categories.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModeView {
    pub mode: Mode,
    /// Fewest players a match can start with.
    pub min_players: usize,
    /// Most players a match accepts, when bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
    pub categories: Vec<CategoryView>,
}

/// Response of `GET /catalog`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    pub modes: Vec<ModeView>,
    pub levels: Vec<LevelView>,
}
