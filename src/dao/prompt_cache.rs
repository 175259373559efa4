//! Read-through prompt cache used when the store cannot answer a prompt query.

use std::time::SystemTime;

use dashmap::DashMap;
use uuid::Uuid;

use crate::dao::models::{PromptEntity, PromptQuery};
use crate::state::catalog::Mode;

/// Counts reported by [`PromptCache::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached prompts.
    pub total: usize,
    /// Cached group prompts.
    pub group: usize,
    /// Cached couple prompts.
    pub couple: usize,
    /// When the oldest entry was cached.
    pub oldest: Option<SystemTime>,
}

/// Local copy of prompt rows, independent of selection logic.
pub trait PromptCache: Send + Sync {
    /// Cached prompts matching `query`, up to its limit.
    fn get(&self, query: &PromptQuery) -> Vec<PromptEntity>;
    /// Insert or refresh prompts.
    fn put(&self, prompts: &[PromptEntity]);
    /// Drop everything.
    fn clear(&self);
    /// Current counts.
    fn stats(&self) -> CacheStats;
}

/// In-process [`PromptCache`].
#[derive(Default)]
pub struct MemoryPromptCache {
    entries: DashMap<Uuid, (PromptEntity, SystemTime)>,
}

impl MemoryPromptCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PromptCache for MemoryPromptCache {
    fn get(&self, query: &PromptQuery) -> Vec<PromptEntity> {
        let mut prompts = self
            .entries
            .iter()
            .filter(|entry| query.matches(&entry.0))
            .map(|entry| entry.0.clone())
            .collect::<Vec<_>>();
        prompts.sort_by_key(|prompt| prompt.id);
        prompts.truncate(query.limit);
        prompts
    }

    fn put(&self, prompts: &[PromptEntity]) {
        let now = SystemTime::now();
        for prompt in prompts {
            self.entries.insert(prompt.id, (prompt.clone(), now));
        }
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn stats(&self) -> CacheStats {
        self.entries
            .iter()
            .fold(CacheStats::default(), |mut stats, entry| {
                let (prompt, cached_at) = entry.value();
                stats.total += 1;
                match prompt.mode {
                    Mode::Group => stats.group += 1,
                    Mode::Couple => stats.couple += 1,
                }
                stats.oldest = Some(stats.oldest.map_or(*cached_at, |oldest| oldest.min(*cached_at)));
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::catalog::{Category, IntensityLevel, Participants, PromptKind};

    fn prompt(mode: Mode, category: Category, level: IntensityLevel) -> PromptEntity {
        PromptEntity {
            id: Uuid::new_v4(),
            mode,
            category,
            level,
            kind: PromptKind::Truth,
            participants: Participants::Solo,
            text: "Tell a secret".into(),
        }
    }

    #[test]
    fn get_respects_the_level_ceiling() {
        let cache = MemoryPromptCache::new();
        cache.put(&[
            prompt(Mode::Couple, Category::Reveal, IntensityLevel::Light),
            prompt(Mode::Couple, Category::Reveal, IntensityLevel::Intense),
            prompt(Mode::Group, Category::Kiss, IntensityLevel::Light),
        ]);

        let hits = cache.get(&PromptQuery {
            mode: Mode::Couple,
            category: Category::Reveal,
            kind: PromptKind::Truth,
            max_level: Some(IntensityLevel::Medium),
            limit: 20,
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].level, IntensityLevel::Light);
    }

    #[test]
    fn stats_and_clear() {
        let cache = MemoryPromptCache::new();
        assert_eq!(cache.stats(), CacheStats::default());

        cache.put(&[
            prompt(Mode::Couple, Category::Act, IntensityLevel::Light),
            prompt(Mode::Group, Category::Touch, IntensityLevel::Light),
            prompt(Mode::Group, Category::Kiss, IntensityLevel::Medium),
        ]);
        let stats = cache.stats();
        assert_eq!((stats.total, stats.group, stats.couple), (3, 2, 1));
        assert!(stats.oldest.is_some());

        cache.clear();
        assert_eq!(cache.stats().total, 0);
    }
}
