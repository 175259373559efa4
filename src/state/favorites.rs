use std::collections::{HashMap, HashSet};

use rand::Rng;
use uuid::Uuid;

use crate::state::catalog::{PlayerId, Prompt};

/// Relative weight a favorited prompt receives by default.
pub const DEFAULT_FAVORITE_WEIGHT: u32 = 10;

/// Favorite prompt ids of every participant in a room.
#[derive(Debug, Clone, Default)]
pub struct FavoritesPool {
    by_player: HashMap<PlayerId, HashSet<Uuid>>,
}

impl FavoritesPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pool from stored `(player, prompt)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (PlayerId, Uuid)>,
    {
        let mut pool = Self::new();
        for (player, prompt) in pairs {
            pool.add(player, prompt);
        }
        pool
    }

    /// Mark `prompt` as favorited by `player`.
    pub fn add(&mut self, player: impl Into<PlayerId>, prompt: Uuid) {
        self.by_player.entry(player.into()).or_default().insert(prompt);
    }

    /// Favorites of a single player.
    pub fn of(&self, player: &str) -> HashSet<Uuid> {
        self.by_player.get(player).cloned().unwrap_or_default()
    }

    /// Union of the actor's favorites with the whole session's favorites.
    pub fn boosted_for(&self, actor: &str) -> HashSet<Uuid> {
        let mut boosted = self.of(actor);
        for favorites in self.by_player.values() {
            boosted.extend(favorites.iter().copied());
        }
        boosted
    }
}

/// Cumulative-weight draw: prompts in `boosted` weigh `weight`, others weigh 1.
///
/// Returns `None` only when `candidates` is empty.
pub fn weighted_pick<'a, R>(
    candidates: &'a [Prompt],
    boosted: &HashSet<Uuid>,
    weight: u32,
    rng: &mut R,
) -> Option<&'a Prompt>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }

    let weights = candidates
        .iter()
        .map(|prompt| {
            if boosted.contains(&prompt.id) {
                u64::from(weight.max(1))
            } else {
                1
            }
        })
        .collect::<Vec<_>>();
    let total: u64 = weights.iter().sum();

    let mut roll = rng.random_range(0..total);
    for (prompt, weight) in candidates.iter().zip(weights) {
        if roll < weight {
            return Some(prompt);
        }
        roll -= weight;
    }

    candidates.last()
}
