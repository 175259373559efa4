//! Host-owned live session of an in-game room.
//!
//! The session holds the roster, the turn machine and the match counters. All
//! mutation goes through `&mut self`; callers serialize access per room.

use std::collections::HashSet;

use indexmap::IndexMap;
use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::selector::{Selection, SelectionRequest},
    state::{
        catalog::{Category, IntensityLevel, Mode, Player, PlayerId, Prompt, PromptKind, SessionKind},
        escalation,
        favorites::FavoritesPool,
        preferences::PreferenceIndex,
        turn::{Plan, PlanId, TurnEvent, TurnMachine, TurnPhase},
    },
};

/// Prompt as displayed: rendered text plus the fields observers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownPrompt {
    /// Identifier of the underlying prompt.
    pub id: Uuid,
    /// Category of the prompt.
    pub category: Category,
    /// Intensity of the prompt.
    pub level: IntensityLevel,
    /// Text with the partner substituted and, for penalties, the punishment appended.
    pub text: String,
    /// Countdown suggested by the text.
    pub timer_seconds: Option<u32>,
}

/// Replicated turn state. Observers replace their copy with each new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Phase of the turn cycle.
    pub phase: TurnPhase,
    /// Round counter, starting at 1.
    pub round: u32,
    /// Acting player, once drawn.
    pub acting: Option<Player>,
    /// Second participant of a pair prompt.
    pub partner: Option<Player>,
    /// Prompt on screen.
    pub prompt: Option<ShownPrompt>,
    /// Type chosen by the acting player.
    pub kind: Option<PromptKind>,
    /// Whether the prompt on screen is a penalty drawn by a skip.
    pub is_penalty: bool,
}

/// Occurrences of one category in a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    /// Category played.
    pub category: Category,
    /// Times a prompt of this category was shown.
    pub count: u32,
}

/// End-of-match counters persisted when the host closes the room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Completed rounds.
    pub rounds: u32,
    /// Skip requests.
    pub skips: u32,
    /// Penalty prompts shown.
    pub penalties: u32,
    /// Vetoes spent.
    pub vetoes: u32,
    /// Per-category play count, in first-played order.
    pub categories: Vec<CategoryCount>,
}

/// Host-only match state kept next to the snapshot so a rebuilt session resumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLedger {
    /// Players who already spent their veto.
    pub vetoed: Vec<PlayerId>,
    /// Skip requests so far.
    pub skips: u32,
    /// Penalty prompts shown so far.
    pub penalties: u32,
    /// Vetoes spent so far.
    pub vetoes: u32,
    /// Per-category play count, in first-played order.
    pub categories: Vec<CategoryCount>,
}

/// Room settings the session needs to drive turns.
#[derive(Debug, Clone)]
pub struct SessionRoom {
    /// Room identifier.
    pub id: Uuid,
    /// Join code.
    pub code: String,
    /// Host identity.
    pub host_id: PlayerId,
    /// Game mode.
    pub mode: Mode,
    /// Online or solo with fictional players.
    pub kind: SessionKind,
    /// Categories allowed in this session; never empty.
    pub allowlist: Vec<Category>,
    /// Text appended to penalty prompts.
    pub punishment: Option<String>,
    /// Whether the intensity cap rises with rounds.
    pub escalation: bool,
    /// Rounds per escalation level.
    pub escalation_step: u32,
}

/// Participants and their selection inputs, captured at call time.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Players in join order.
    pub players: Vec<Player>,
    /// Intensity ceilings of those players.
    pub preferences: PreferenceIndex,
    /// Favorites of those players.
    pub favorites: FavoritesPool,
}

/// Store-side query for the penalty pool of the current prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyQuery {
    /// Room mode.
    pub mode: Mode,
    /// Category of the skipped prompt.
    pub category: Category,
    /// Type of the skipped prompt.
    pub kind: PromptKind,
}

/// Result of a veto request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VetoOutcome {
    /// The veto was spent; the round moved on. Carries a new escalation level, if any.
    Applied(Option<IntensityLevel>),
    /// The acting player already spent their veto; nothing changed.
    Exhausted,
}

#[derive(Debug, Clone, Default)]
struct Counters {
    skips: u32,
    penalties: u32,
    vetoes: u32,
    categories: IndexMap<Category, u32>,
}

/// Live turn state of one in-game room.
#[derive(Debug, Clone)]
pub struct HostSession {
    room: SessionRoom,
    roster: Roster,
    machine: TurnMachine,
    round: u32,
    acting: Option<Player>,
    partner: Option<Player>,
    prompt: Option<ShownPrompt>,
    kind: Option<PromptKind>,
    is_penalty: bool,
    vetoed: HashSet<PlayerId>,
    last_actor: Option<PlayerId>,
    counters: Counters,
}

impl HostSession {
    /// Session at round 1, waiting for the first draw.
    pub fn new(room: SessionRoom, roster: Roster) -> Self {
        Self {
            room,
            roster,
            machine: TurnMachine::new(),
            round: 1,
            acting: None,
            partner: None,
            prompt: None,
            kind: None,
            is_penalty: false,
            vetoed: HashSet::new(),
            last_actor: None,
            counters: Counters::default(),
        }
    }

    /// Session resumed from a replicated snapshot and, when stored, its ledger.
    pub fn restore(
        room: SessionRoom,
        roster: Roster,
        snapshot: TurnSnapshot,
        ledger: Option<SessionLedger>,
    ) -> Self {
        let mut session = Self::new(room, roster);
        if let Some(ledger) = ledger {
            session.vetoed = ledger.vetoed.into_iter().collect();
            session.counters = Counters {
                skips: ledger.skips,
                penalties: ledger.penalties,
                vetoes: ledger.vetoes,
                categories: ledger
                    .categories
                    .into_iter()
                    .map(|entry| (entry.category, entry.count))
                    .collect(),
            };
        }
        session.machine = TurnMachine::at(snapshot.phase);
        session.round = snapshot.round.max(1);
        session.last_actor = snapshot.acting.as_ref().map(|player| player.id.clone());
        session.acting = snapshot.acting;
        session.partner = snapshot.partner;
        session.prompt = snapshot.prompt;
        session.kind = snapshot.kind;
        session.is_penalty = snapshot.is_penalty;
        session
    }

    /// Room settings.
    pub fn room(&self) -> &SessionRoom {
        &self.room
    }

    /// Current participants.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Replace the participants with a fresh call-time snapshot.
    ///
    /// Couple seats are fixed at start: only preferences and favorites refresh.
    pub fn refresh_roster(&mut self, mut roster: Roster) {
        if self.room.mode == Mode::Couple {
            let seated = self
                .roster
                .players
                .iter()
                .map(|player| player.id.as_str())
                .collect::<HashSet<_>>();
            roster
                .players
                .retain(|player| seated.contains(player.id.as_str()));
        }
        self.roster = roster;
    }

    /// Apply edited settings to the running session.
    pub fn update_settings(
        &mut self,
        allowlist: Vec<Category>,
        punishment: Option<String>,
        escalation: bool,
    ) {
        self.room.allowlist = allowlist;
        self.room.punishment = punishment;
        self.room.escalation = escalation;
    }

    /// Current turn phase.
    pub fn phase(&self) -> TurnPhase {
        self.machine.phase()
    }

    /// Current round.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Whether `player` still holds their veto.
    pub fn can_veto(&self, player: &str) -> bool {
        !self.vetoed.contains(player)
    }

    /// Acting player, once drawn.
    pub fn acting(&self) -> Option<&Player> {
        self.acting.as_ref()
    }

    /// Intensity cap for the current round, when escalation is on.
    pub fn escalation_cap(&self) -> Option<IntensityLevel> {
        self.room
            .escalation
            .then(|| escalation::cap_for_round(self.round, self.room.escalation_step))
    }

    /// Full replicated snapshot of the turn.
    pub fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            phase: self.machine.phase(),
            round: self.round,
            acting: self.acting.clone(),
            partner: self.partner.clone(),
            prompt: self.prompt.clone(),
            kind: self.kind,
            is_penalty: self.is_penalty,
        }
    }

    /// Vetoes and counters to persist alongside the snapshot.
    pub fn ledger(&self) -> SessionLedger {
        let mut vetoed = self.vetoed.iter().cloned().collect::<Vec<_>>();
        vetoed.sort();
        SessionLedger {
            vetoed,
            skips: self.counters.skips,
            penalties: self.counters.penalties,
            vetoes: self.counters.vetoes,
            categories: self.category_counts(),
        }
    }

    fn category_counts(&self) -> Vec<CategoryCount> {
        self.counters
            .categories
            .iter()
            .map(|(category, count)| CategoryCount {
                category: *category,
                count: *count,
            })
            .collect()
    }

    /// Counters accumulated so far; `rounds` counts completed rounds.
    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            rounds: self.round.saturating_sub(1),
            skips: self.counters.skips,
            penalties: self.counters.penalties,
            vetoes: self.counters.vetoes,
            categories: self.category_counts(),
        }
    }

    /// Draw the acting player.
    ///
    /// Couple rooms past round 1 hand the turn to the other participant instead of drawing.
    pub fn draw<R>(&mut self, rng: &mut R) -> Result<&Player, ServiceError>
    where
        R: Rng + ?Sized,
    {
        let plan = self.machine.plan(TurnEvent::Draw)?;

        let Some(actor) = self.next_actor(rng) else {
            self.machine.abort(plan.id)?;
            return Err(ServiceError::InvalidState("room has no players to draw".into()));
        };

        self.machine.apply(plan.id)?;
        self.last_actor = Some(actor.id.clone());
        self.acting = Some(actor);
        self.clear_prompt();

        debug!(room = %self.room.code, round = self.round, "acting player drawn");
        self.acting
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("acting player missing".into()))
    }

    fn next_actor<R>(&self, rng: &mut R) -> Option<Player>
    where
        R: Rng + ?Sized,
    {
        let players = &self.roster.players;
        if self.room.mode == Mode::Couple && self.round > 1 {
            let handoff = self.last_actor.as_ref().and_then(|last| {
                players
                    .iter()
                    .find(|player| &player.id != last)
                    .cloned()
            });
            if handoff.is_some() {
                return handoff;
            }
        }
        players.choose(rng).cloned()
    }

    /// Reserve the choose transition and capture the selector inputs.
    pub fn plan_choice(&mut self, kind: PromptKind) -> Result<(Plan, SelectionRequest), ServiceError> {
        let plan = self.machine.plan(TurnEvent::ShowPrompt)?;
        let Some(actor) = self.acting.clone() else {
            self.machine.abort(plan.id)?;
            return Err(ServiceError::InvalidState("no acting player".into()));
        };

        let request = SelectionRequest {
            boosted: self.roster.favorites.boosted_for(&actor.id),
            actor,
            kind,
            mode: self.room.mode,
            players: self.roster.players.clone(),
            preferences: self.roster.preferences.clone(),
            allowlist: Some(self.room.allowlist.clone()),
            escalation_cap: self.escalation_cap(),
        };

        Ok((plan, request))
    }

    /// Complete a planned choice with the selector's result.
    pub fn show_selection(
        &mut self,
        plan_id: PlanId,
        kind: PromptKind,
        selection: Selection,
    ) -> Result<(), ServiceError> {
        self.machine.apply(plan_id)?;

        let Selection { prompt, partner } = selection;
        *self.counters.categories.entry(prompt.category).or_default() += 1;
        self.prompt = Some(shown(&prompt, partner.as_ref(), None));
        self.partner = partner;
        self.kind = Some(kind);
        self.is_penalty = false;
        Ok(())
    }

    /// Drop a planned choice that found no compatible prompt and skip the round.
    pub fn abandon_choice(&mut self, plan_id: PlanId) -> Result<Option<IntensityLevel>, ServiceError> {
        self.machine.abort(plan_id)?;
        self.transition_to_next_round(TurnEvent::NoPrompt)
    }

    /// Reserve the penalty transition for a skip and describe the pool to query.
    ///
    /// Counts the skip. Penalty prompts cannot be skipped again.
    pub fn plan_skip(&mut self) -> Result<(Plan, PenaltyQuery), ServiceError> {
        if self.is_penalty {
            return Err(ServiceError::InvalidState(
                "a penalty prompt can only be advanced".into(),
            ));
        }

        let plan = self.machine.plan(TurnEvent::Penalty)?;
        let query = match (&self.prompt, self.kind) {
            (Some(prompt), Some(kind)) => PenaltyQuery {
                mode: self.room.mode,
                category: prompt.category,
                kind,
            },
            _ => {
                self.machine.abort(plan.id)?;
                return Err(ServiceError::InvalidState("no prompt to skip".into()));
            }
        };

        self.counters.skips += 1;
        Ok((plan, query))
    }

    /// Pick a penalty from the pool: solo prompts, or pair prompts with a compatible partner.
    pub fn pick_penalty<R>(&self, pool: Vec<Prompt>, rng: &mut R) -> Option<Selection>
    where
        R: Rng + ?Sized,
    {
        let actor = self.acting.as_ref()?;
        let eligible = pool
            .into_iter()
            .filter_map(|prompt| {
                if !prompt.needs_partner() {
                    return Some(Selection {
                        prompt,
                        partner: None,
                    });
                }
                let partners = self.roster.preferences.compatible_partners(
                    &self.roster.players,
                    &actor.id,
                    &prompt,
                );
                let partner = partners.choose(rng).map(|player| (*player).clone())?;
                Some(Selection {
                    prompt,
                    partner: Some(partner),
                })
            })
            .collect::<Vec<_>>();

        let index = (!eligible.is_empty()).then(|| rng.random_range(0..eligible.len()))?;
        eligible.into_iter().nth(index)
    }

    /// Complete a planned skip by showing the penalty prompt.
    pub fn show_penalty(&mut self, plan_id: PlanId, penalty: Selection) -> Result<(), ServiceError> {
        self.machine.apply(plan_id)?;

        let Selection { prompt, partner } = penalty;
        self.counters.penalties += 1;
        self.prompt = Some(shown(
            &prompt,
            partner.as_ref(),
            self.room.punishment.as_deref(),
        ));
        self.partner = partner;
        self.is_penalty = true;
        Ok(())
    }

    /// Drop a planned skip whose pool was empty and move to the next round.
    pub fn abandon_skip(&mut self, plan_id: PlanId) -> Result<Option<IntensityLevel>, ServiceError> {
        self.machine.abort(plan_id)?;
        self.transition_to_next_round(TurnEvent::NextRound)
    }

    /// Finish the current prompt and start the next round.
    pub fn advance(&mut self) -> Result<Option<IntensityLevel>, ServiceError> {
        self.transition_to_next_round(TurnEvent::NextRound)
    }

    /// Spend the acting player's veto. A second veto by the same player is a no-op.
    pub fn veto(&mut self) -> Result<VetoOutcome, ServiceError> {
        let actor = self
            .acting
            .as_ref()
            .map(|player| player.id.clone())
            .ok_or_else(|| ServiceError::InvalidState("no acting player".into()))?;

        if !self.can_veto(&actor) {
            return Ok(VetoOutcome::Exhausted);
        }
        if self.is_penalty {
            return Err(ServiceError::InvalidState(
                "a penalty prompt can only be advanced".into(),
            ));
        }

        let level_up = self.transition_to_next_round(TurnEvent::Veto)?;
        self.vetoed.insert(actor);
        self.counters.vetoes += 1;
        Ok(VetoOutcome::Applied(level_up))
    }

    /// Move the turn machine to its terminal phase and return the final counters.
    pub fn end(&mut self) -> Result<MatchSummary, ServiceError> {
        if self.machine.phase() != TurnPhase::Ended {
            let plan = self.machine.plan(TurnEvent::End)?;
            self.machine.apply(plan.id)?;
        }
        Ok(self.summary())
    }

    fn transition_to_next_round(
        &mut self,
        event: TurnEvent,
    ) -> Result<Option<IntensityLevel>, ServiceError> {
        let plan = self.machine.plan(event)?;
        self.machine.apply(plan.id)?;

        let previous = self.round;
        self.round += 1;
        self.clear_prompt();

        Ok(self
            .room
            .escalation
            .then(|| escalation::level_up(previous, self.round, self.room.escalation_step))
            .flatten())
    }

    fn clear_prompt(&mut self) {
        self.partner = None;
        self.prompt = None;
        self.kind = None;
        self.is_penalty = false;
    }
}

fn shown(prompt: &Prompt, partner: Option<&Player>, punishment: Option<&str>) -> ShownPrompt {
    let mut text = prompt.render(partner);
    if let Some(extra) = punishment.map(str::trim).filter(|extra| !extra.is_empty()) {
        text.push_str("\n\n");
        text.push_str(extra);
    }

    ShownPrompt {
        id: prompt.id,
        category: prompt.category,
        level: prompt.level,
        timer_seconds: prompt.timer_seconds(),
        text,
    }
}
