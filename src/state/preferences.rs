use std::collections::HashMap;

use crate::state::catalog::{Category, IntensityLevel, Mode, Player, PlayerId, Prompt};

/// Per-player, per-category intensity ceilings for one room's participants.
///
/// Entries that were never stored are not materialised; [`PreferenceIndex::level`]
/// reports them as [`IntensityLevel::Light`] so unconfigured categories stay playable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceIndex {
    levels: HashMap<(PlayerId, Category), IntensityLevel>,
}

impl PreferenceIndex {
    /// Empty index; every lookup yields the implicit default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from stored `(player, category, level)` rows.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PlayerId, Category, IntensityLevel)>,
    {
        let levels = entries
            .into_iter()
            .map(|(player, category, level)| ((player, category), level))
            .collect();
        Self { levels }
    }

    /// Record an explicit level, replacing any previous value.
    pub fn set(&mut self, player: impl Into<PlayerId>, category: Category, level: IntensityLevel) {
        self.levels.insert((player.into(), category), level);
    }

    /// Give `player` the same level for every category of `mode`.
    pub fn set_uniform(&mut self, player: impl Into<PlayerId>, mode: Mode, level: IntensityLevel) {
        let player = player.into();
        for category in mode.categories() {
            self.levels.insert((player.clone(), *category), level);
        }
    }

    /// Effective level, falling back to [`IntensityLevel::Light`] when unset.
    pub fn level(&self, player: &str, category: Category) -> IntensityLevel {
        self.explicit(player, category)
            .unwrap_or(IntensityLevel::Light)
    }

    /// Stored level only, without the implicit default.
    pub fn explicit(&self, player: &str, category: Category) -> Option<IntensityLevel> {
        self.levels.get(&(player.to_owned(), category)).copied()
    }

    /// Categories of `mode` for which `player` accepts at least light content.
    pub fn enabled_categories(&self, player: &str, mode: Mode) -> Vec<Category> {
        mode.categories()
            .iter()
            .copied()
            .filter(|category| self.level(player, *category) >= IntensityLevel::Light)
            .collect()
    }

    /// Players other than `actor` whose level for the prompt's category reaches the prompt's level.
    pub fn compatible_partners<'a>(
        &self,
        players: &'a [Player],
        actor: &str,
        prompt: &Prompt,
    ) -> Vec<&'a Player> {
        players
            .iter()
            .filter(|player| player.id != actor)
            .filter(|player| self.level(&player.id, prompt.category) >= prompt.level)
            .collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether no entry has been stored.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_entries_default_to_light() {
        let index = PreferenceIndex::new();
        assert_eq!(index.level("ana", Category::Kiss), IntensityLevel::Light);
        assert_eq!(index.explicit("ana", Category::Kiss), None);
        assert_eq!(index.enabled_categories("ana", Mode::Group).len(), 6);
    }

    #[test]
    fn never_excludes_the_category() {
        let mut index = PreferenceIndex::new();
        index.set("ana", Category::Kiss, IntensityLevel::Never);
        index.set("ana", Category::Touch, IntensityLevel::Intense);

        let enabled = index.enabled_categories("ana", Mode::Group);
        assert!(!enabled.contains(&Category::Kiss));
        assert!(enabled.contains(&Category::Touch));
        assert_eq!(index.level("bia", Category::Kiss), IntensityLevel::Light);
    }

    #[test]
    fn uniform_levels_cover_the_whole_mode() {
        let mut index = PreferenceIndex::new();
        index.set_uniform("fictional-1", Mode::Couple, IntensityLevel::Medium);

        assert_eq!(index.len(), Mode::Couple.categories().len());
        for category in Mode::Couple.categories() {
            assert_eq!(index.level("fictional-1", *category), IntensityLevel::Medium);
        }
    }
}
