use crate::{
    dto::catalog::{CatalogResponse, CategoryView, LevelView, ModeView},
    state::catalog::{IntensityLevel, Mode},
};

/// Modes with their categories, and the intensity labels.
pub fn catalog() -> CatalogResponse {
    let modes = Mode::ALL
        .iter()
        .map(|mode| {
            let (min_players, max_players) = match mode {
                Mode::Group => (3, None),
                Mode::Couple => (2, Some(2)),
            };
            ModeView {
                mode: *mode,
                min_players,
                max_players,
                categories: mode
                    .categories()
                    .iter()
                    .copied()
                    .map(CategoryView::from)
                    .collect(),
            }
        })
        .collect();

    CatalogResponse {
        modes,
        levels: IntensityLevel::ALL.into_iter().map(LevelView::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headcount_rules_match_the_modes() {
        let catalog = catalog();
        for view in &catalog.modes {
            assert!(view.mode.accepts_headcount(view.min_players));
            assert!(!view.mode.accepts_headcount(view.min_players - 1));
        }
        let labels = catalog
            .levels
            .iter()
            .map(|level| level.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, ["Never", "Light", "Medium", "Intense"]);
    }
}
