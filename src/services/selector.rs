//! Prompt selection: category roll, intensity ceiling, weighted draw and partner matching.

use std::{collections::HashSet, sync::Arc};

use futures::future::BoxFuture;
use rand::{Rng, seq::IndexedRandom};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::PromptQuery,
        prompt_cache::PromptCache,
        record_store::RecordStore,
        storage::StorageResult,
    },
    state::{
        catalog::{Category, IntensityLevel, Mode, Player, Prompt, PromptKind},
        favorites::weighted_pick,
        preferences::PreferenceIndex,
    },
};

/// Anything able to answer a filtered prompt query.
pub trait PromptSource: Send + Sync {
    /// Prompts matching `query`, up to its limit.
    fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<Prompt>>>;
}

/// Record store reads with the prompt cache as fallback.
///
/// Successful reads refresh the cache; failed reads are answered from it when it has matches.
#[derive(Clone)]
pub struct CachedPromptSource {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn PromptCache>,
}

impl CachedPromptSource {
    /// Combine a store with a cache.
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn PromptCache>) -> Self {
        Self { store, cache }
    }
}

impl PromptSource for CachedPromptSource {
    fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<Prompt>>> {
        let pending = self.store.find_prompts(query);
        let cache = self.cache.clone();
        Box::pin(async move {
            let rows = match pending.await {
                Ok(rows) => {
                    cache.put(&rows);
                    rows
                }
                Err(err) => {
                    let cached = cache.get(&query);
                    if cached.is_empty() {
                        return Err(err);
                    }
                    warn!(error = %err, cached = cached.len(), "prompt query failed; serving cached prompts");
                    cached
                }
            };
            Ok(rows.into_iter().map(Prompt::from).collect())
        })
    }
}

/// Tunables of the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSettings {
    /// Category attempts before giving up.
    pub attempts: usize,
    /// Store-side limit per fetch.
    pub fetch_limit: usize,
    /// Relative weight of favorited prompts.
    pub favorite_weight: u32,
}

impl From<&AppConfig> for SelectorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            attempts: config.selection_attempts,
            fetch_limit: config.selection_fetch_limit,
            favorite_weight: config.favorite_weight,
        }
    }
}

/// Inputs of one selection, captured when the acting player chooses a type.
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    /// Acting player.
    pub actor: Player,
    /// Type picked by the actor.
    pub kind: PromptKind,
    /// Room mode.
    pub mode: Mode,
    /// Every participant, actor included.
    pub players: Vec<Player>,
    /// Intensity ceilings of the participants.
    pub preferences: PreferenceIndex,
    /// Active-category allowlist; `None` or empty means unrestricted.
    pub allowlist: Option<Vec<Category>>,
    /// Escalation cap for the current round.
    pub escalation_cap: Option<IntensityLevel>,
    /// Favorites of the actor and of the session.
    pub boosted: HashSet<Uuid>,
}

/// A prompt and, for pair prompts, the matched partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected prompt.
    pub prompt: Prompt,
    /// Second participant.
    pub partner: Option<Player>,
}

/// Selects prompts compatible with every participant involved.
#[derive(Clone)]
pub struct PromptSelector {
    source: Arc<dyn PromptSource>,
    settings: SelectorSettings,
}

impl PromptSelector {
    /// Selector reading from `source`.
    pub fn new(source: Arc<dyn PromptSource>, settings: SelectorSettings) -> Self {
        Self { source, settings }
    }

    /// Categories the actor may receive: their enabled categories, narrowed by the allowlist.
    pub fn candidate_categories(request: &SelectionRequest) -> Vec<Category> {
        let mut candidates = request
            .preferences
            .enabled_categories(&request.actor.id, request.mode);
        if let Some(allowlist) = request.allowlist.as_ref().filter(|list| !list.is_empty()) {
            candidates.retain(|category| allowlist.contains(category));
        }
        candidates
    }

    /// Select a prompt, or `None` when every attempt came up empty.
    ///
    /// Each attempt rolls a category not tried yet (any candidate once all were tried),
    /// fetches prompts up to the actor's ceiling for it, draws one with favorites
    /// weighted, and for pair prompts draws a partner whose own level reaches the
    /// prompt's. Fetch failures count as empty attempts.
    pub async fn select<R>(&self, request: &SelectionRequest, rng: &mut R) -> Option<Selection>
    where
        R: Rng + Send,
    {
        let candidates = Self::candidate_categories(request);
        if candidates.is_empty() {
            debug!(actor = %request.actor.id, "no candidate categories");
            return None;
        }

        let mut untried = candidates.clone();
        for attempt in 1..=self.settings.attempts {
            let category = if untried.is_empty() {
                *candidates.choose(rng)?
            } else {
                untried.swap_remove(rng.random_range(0..untried.len()))
            };

            let actor_level = request.preferences.level(&request.actor.id, category);
            let ceiling = request
                .escalation_cap
                .map_or(actor_level, |cap| actor_level.min(cap));
            let query = PromptQuery {
                mode: request.mode,
                category,
                kind: request.kind,
                max_level: Some(ceiling),
                limit: self.settings.fetch_limit,
            };

            let prompts = match self.source.find_prompts(query).await {
                Ok(prompts) => prompts,
                Err(err) => {
                    warn!(attempt, category = category.as_str(), error = %err, "prompt fetch failed");
                    Vec::new()
                }
            };

            let Some(prompt) =
                weighted_pick(&prompts, &request.boosted, self.settings.favorite_weight, rng).cloned()
            else {
                debug!(attempt, category = category.as_str(), "no prompts for category");
                continue;
            };

            if !prompt.needs_partner() {
                return Some(Selection {
                    prompt,
                    partner: None,
                });
            }

            let partners =
                request
                    .preferences
                    .compatible_partners(&request.players, &request.actor.id, &prompt);
            match partners.choose(rng) {
                Some(partner) => {
                    return Some(Selection {
                        partner: Some((*partner).clone()),
                        prompt,
                    });
                }
                None => {
                    debug!(attempt, category = category.as_str(), "no compatible partner");
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::dao::storage::StorageError;
    use crate::state::catalog::Participants;

    struct Fixture(Vec<Prompt>);

    impl PromptSource for Fixture {
        fn find_prompts(&self, query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<Prompt>>> {
            let rows = self
                .0
                .iter()
                .filter(|p| p.mode == query.mode && p.category == query.category && p.kind == query.kind)
                .filter(|p| query.max_level.is_none_or(|max| p.level <= max))
                .take(query.limit)
                .cloned()
                .collect();
            Box::pin(async move { Ok(rows) })
        }
    }

    struct Broken;

    impl PromptSource for Broken {
        fn find_prompts(&self, _query: PromptQuery) -> BoxFuture<'static, StorageResult<Vec<Prompt>>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "offline".into(),
                    io::Error::other("connection refused"),
                ))
            })
        }
    }

    fn player(id: &str) -> Player {
        Player {
            id: id.into(),
            display_name: None,
            avatar_url: None,
        }
    }

    fn prompt(category: Category, level: IntensityLevel, kind: PromptKind, participants: Participants) -> Prompt {
        Prompt {
            id: Uuid::new_v4(),
            mode: category.mode(),
            category,
            level,
            kind,
            participants,
            text: format!("{} {}", category.code(), level.label()),
        }
    }

    /// Every category of both modes, every level, both kinds, solo and pair.
    fn full_catalogue() -> Vec<Prompt> {
        let mut prompts = Vec::new();
        for mode in Mode::ALL {
            for category in mode.categories() {
                for level in [IntensityLevel::Light, IntensityLevel::Medium, IntensityLevel::Intense] {
                    for kind in [PromptKind::Truth, PromptKind::Dare] {
                        prompts.push(prompt(*category, level, kind, Participants::Solo));
                        prompts.push(prompt(*category, level, kind, Participants::Pair));
                    }
                }
            }
        }
        prompts
    }

    fn selector(source: impl PromptSource + 'static) -> PromptSelector {
        PromptSelector::new(
            Arc::new(source),
            SelectorSettings {
                attempts: 3,
                fetch_limit: 200,
                favorite_weight: 10,
            },
        )
    }

    fn request(mode: Mode, players: &[&str], preferences: PreferenceIndex) -> SelectionRequest {
        SelectionRequest {
            actor: player(players[0]),
            kind: PromptKind::Dare,
            mode,
            players: players.iter().map(|id| player(id)).collect(),
            preferences,
            allowlist: None,
            escalation_cap: None,
            boosted: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn never_leaves_the_allowlist() {
        let selector = selector(Fixture(full_catalogue()));
        let mut req = request(Mode::Group, &["ana", "bia", "carla"], PreferenceIndex::new());
        req.allowlist = Some(vec![Category::Kiss, Category::Performance]);

        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = selector.select(&req, &mut rng).await.unwrap();
            assert!(req.allowlist.as_ref().unwrap().contains(&selection.prompt.category));
        }
    }

    #[tokio::test]
    async fn empty_allowlist_means_unrestricted() {
        let mut req = request(Mode::Group, &["ana", "bia", "carla"], PreferenceIndex::new());
        req.allowlist = Some(Vec::new());
        assert_eq!(PromptSelector::candidate_categories(&req).len(), 6);
    }

    #[tokio::test]
    async fn respects_actor_level_and_escalation_cap() {
        let selector = selector(Fixture(full_catalogue()));
        let mut preferences = PreferenceIndex::new();
        preferences.set_uniform("ana", Mode::Couple, IntensityLevel::Intense);
        preferences.set("ana", Category::Sensory, IntensityLevel::Light);
        let mut req = request(Mode::Couple, &["ana", "bia"], preferences);
        req.escalation_cap = Some(IntensityLevel::Medium);

        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let Some(selection) = selector.select(&req, &mut rng).await else {
                continue;
            };
            let actor_level = req.preferences.level("ana", selection.prompt.category);
            assert!(selection.prompt.level <= actor_level.min(IntensityLevel::Medium));
        }
    }

    #[tokio::test]
    async fn partners_reach_the_prompt_level() {
        let selector = selector(Fixture(full_catalogue()));
        let mut preferences = PreferenceIndex::new();
        preferences.set_uniform("ana", Mode::Group, IntensityLevel::Intense);
        preferences.set_uniform("bia", Mode::Group, IntensityLevel::Medium);
        preferences.set_uniform("carla", Mode::Group, IntensityLevel::Never);
        let req = request(Mode::Group, &["ana", "bia", "carla"], preferences);

        let mut pairs = 0;
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let Some(selection) = selector.select(&req, &mut rng).await else {
                continue;
            };
            if let Some(partner) = &selection.partner {
                pairs += 1;
                let level = req.preferences.level(&partner.id, selection.prompt.category);
                assert!(level >= selection.prompt.level);
                assert_ne!(partner.id, "carla");
            } else {
                assert!(!selection.prompt.needs_partner());
            }
        }
        assert!(pairs > 0);
    }

    #[tokio::test]
    async fn light_touch_dare_for_a_fresh_group() {
        let selector = selector(Fixture(full_catalogue()));
        let mut preferences = PreferenceIndex::new();
        for id in ["ana", "bia", "carla"] {
            preferences.set_uniform(id, Mode::Group, IntensityLevel::Never);
            preferences.set(id, Category::Touch, IntensityLevel::Light);
        }
        let req = request(Mode::Group, &["ana", "bia", "carla"], preferences);

        let mut rng = StdRng::seed_from_u64(21);
        let selection = selector.select(&req, &mut rng).await.unwrap();
        assert_eq!(selection.prompt.category, Category::Touch);
        assert_eq!(selection.prompt.kind, PromptKind::Dare);
        assert!(selection.prompt.level <= IntensityLevel::Light);
    }

    #[tokio::test]
    async fn only_the_qualified_member_can_partner() {
        let pool = vec![prompt(
            Category::Roleplay,
            IntensityLevel::Intense,
            PromptKind::Dare,
            Participants::Pair,
        )];
        let selector = selector(Fixture(pool));

        let mut preferences = PreferenceIndex::new();
        for id in ["ana", "bia", "carla", "duda"] {
            preferences.set_uniform(id, Mode::Couple, IntensityLevel::Never);
        }
        preferences.set("ana", Category::Roleplay, IntensityLevel::Intense);
        preferences.set("bia", Category::Roleplay, IntensityLevel::Intense);
        preferences.set("carla", Category::Roleplay, IntensityLevel::Medium);
        preferences.set("duda", Category::Roleplay, IntensityLevel::Light);
        let req = request(Mode::Couple, &["ana", "bia", "carla", "duda"], preferences);

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = selector.select(&req, &mut rng).await.unwrap();
            assert_eq!(selection.partner.map(|p| p.id).as_deref(), Some("bia"));
        }
    }

    #[tokio::test]
    async fn no_candidates_or_no_partner_yields_none() {
        let mut preferences = PreferenceIndex::new();
        preferences.set_uniform("ana", Mode::Group, IntensityLevel::Never);
        let req = request(Mode::Group, &["ana", "bia", "carla"], preferences);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(selector(Fixture(full_catalogue())).select(&req, &mut rng).await.is_none());

        let pool = vec![prompt(Category::Kiss, IntensityLevel::Light, PromptKind::Dare, Participants::Pair)];
        let mut preferences = PreferenceIndex::new();
        preferences.set_uniform("bia", Mode::Group, IntensityLevel::Never);
        let req = request(Mode::Group, &["ana", "bia"], preferences);
        assert!(selector(Fixture(pool)).select(&req, &mut rng).await.is_none());
    }

    #[tokio::test]
    async fn fetch_failures_count_as_empty() {
        let req = request(Mode::Group, &["ana", "bia", "carla"], PreferenceIndex::new());
        let mut rng = StdRng::seed_from_u64(5);
        assert!(selector(Broken).select(&req, &mut rng).await.is_none());
    }
}
