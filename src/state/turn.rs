use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Phases of the turn cycle inside an in-game room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Waiting for the host to draw the acting player.
    Drawing,
    /// The acting player is picking truth or dare.
    Choosing,
    /// A prompt (or penalty) is on screen.
    ShowingPrompt,
    /// The room was closed; no further turns.
    Ended,
}

/// Events that can be applied to the turn machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// An acting player was drawn (or the couple handoff happened).
    Draw,
    /// The selector produced a prompt.
    ShowPrompt,
    /// The selector found nothing compatible; the round is skipped.
    NoPrompt,
    /// A skip replaced the prompt with a penalty card.
    Penalty,
    /// The current prompt is done; next round.
    NextRound,
    /// The acting player spent their veto; next round without penalty.
    Veto,
    /// The room closed.
    End,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid turn transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in when the event was received.
    pub from: TurnPhase,
    /// Event that cannot be applied from this phase.
    pub event: TurnEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the machine will move to.
    pub to: TurnPhase,
}

/// Host-owned turn cycle with a plan/apply/abort protocol.
///
/// Work that may fail (prompt selection, store reads) runs between `plan` and
/// `apply`; on failure the plan is aborted and the phase is untouched.
#[derive(Debug, Clone)]
pub struct TurnMachine {
    phase: TurnPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::at(TurnPhase::Drawing)
    }
}

impl TurnMachine {
    /// Machine at the start of a match.
    pub fn new() -> Self {
        Self::default()
    }

    /// Machine resumed at `phase`, used when rebuilding from a stored snapshot.
    pub fn at(phase: TurnPhase) -> Self {
        Self {
            phase,
            version: 0,
            pending: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Number of applied transitions.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Phase the pending plan leads to, if any.
    pub fn pending(&self) -> Option<TurnPhase> {
        self.pending.as_ref().map(|plan| plan.to)
    }

    /// Validate `event` against the current phase and reserve the transition.
    pub fn plan(&mut self, event: TurnEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            to: next,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition and return the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<TurnPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        self.phase = plan.to;
        self.version += 1;

        Ok(self.phase)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: TurnEvent) -> Result<TurnPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (TurnPhase::Drawing, TurnEvent::Draw) => TurnPhase::Choosing,
            (TurnPhase::Choosing, TurnEvent::ShowPrompt) => TurnPhase::ShowingPrompt,
            (TurnPhase::Choosing, TurnEvent::NoPrompt) => TurnPhase::Drawing,
            (TurnPhase::ShowingPrompt, TurnEvent::Penalty) => TurnPhase::ShowingPrompt,
            (TurnPhase::ShowingPrompt, TurnEvent::NextRound | TurnEvent::Veto) => {
                TurnPhase::Drawing
            }
            (phase, TurnEvent::End) if phase != TurnPhase::Ended => TurnPhase::Ended,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(machine: &mut TurnMachine, event: TurnEvent) -> TurnPhase {
        let plan = machine.plan(event).unwrap();
        machine.apply(plan.id).unwrap()
    }

    #[test]
    fn starts_drawing() {
        assert_eq!(TurnMachine::new().phase(), TurnPhase::Drawing);
    }

    #[test]
    fn full_round_with_penalty() {
        let mut machine = TurnMachine::new();

        assert_eq!(apply(&mut machine, TurnEvent::Draw), TurnPhase::Choosing);
        assert_eq!(apply(&mut machine, TurnEvent::ShowPrompt), TurnPhase::ShowingPrompt);
        assert_eq!(apply(&mut machine, TurnEvent::Penalty), TurnPhase::ShowingPrompt);
        assert_eq!(apply(&mut machine, TurnEvent::NextRound), TurnPhase::Drawing);
        assert_eq!(machine.version(), 4);
    }

    #[test]
    fn no_prompt_returns_to_drawing() {
        let mut machine = TurnMachine::new();
        apply(&mut machine, TurnEvent::Draw);
        assert_eq!(apply(&mut machine, TurnEvent::NoPrompt), TurnPhase::Drawing);
    }

    #[test]
    fn veto_only_while_showing_a_prompt() {
        let mut machine = TurnMachine::new();
        let err = machine.plan(TurnEvent::Veto).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidTransition(InvalidTransition {
                from: TurnPhase::Drawing,
                event: TurnEvent::Veto,
            })
        );

        apply(&mut machine, TurnEvent::Draw);
        apply(&mut machine, TurnEvent::ShowPrompt);
        assert_eq!(apply(&mut machine, TurnEvent::Veto), TurnPhase::Drawing);
    }

    #[test]
    fn end_is_terminal() {
        let mut machine = TurnMachine::new();
        apply(&mut machine, TurnEvent::Draw);
        assert_eq!(apply(&mut machine, TurnEvent::End), TurnPhase::Ended);
        assert!(machine.plan(TurnEvent::End).is_err());
        assert!(machine.plan(TurnEvent::Draw).is_err());
    }

    #[test]
    fn abort_clears_pending() {
        let mut machine = TurnMachine::new();
        let plan = machine.plan(TurnEvent::Draw).unwrap();
        assert_eq!(machine.pending(), Some(TurnPhase::Choosing));
        assert_eq!(machine.plan(TurnEvent::Draw).unwrap_err(), PlanError::AlreadyPending);

        machine.abort(plan.id).unwrap();
        assert!(machine.pending().is_none());
        assert_eq!(machine.phase(), TurnPhase::Drawing);
    }

    #[test]
    fn apply_rejects_foreign_plan() {
        let mut machine = TurnMachine::new();
        machine.plan(TurnEvent::Draw).unwrap();
        let err = machine.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(machine.pending(), Some(TurnPhase::Choosing));
    }
}
