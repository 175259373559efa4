use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::catalog::Mode;

/// Room lifecycle status. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Lobby: players join and settings are edited.
    Waiting,
    /// A match is running; the host drives the turn cycle.
    InGame,
    /// The host closed the room.
    Ended,
}

impl RoomStatus {
    /// Storage representation, identical to the serde name.
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::InGame => "in_game",
            RoomStatus::Ended => "ended",
        }
    }

    /// Status reached by applying `event`, if the lifecycle allows it.
    pub fn apply(self, event: RoomEvent) -> Result<RoomStatus, InvalidRoomTransition> {
        match (self, event) {
            (RoomStatus::Waiting, RoomEvent::Start) => Ok(RoomStatus::InGame),
            (RoomStatus::Waiting | RoomStatus::InGame, RoomEvent::Close) => Ok(RoomStatus::Ended),
            (from, event) => Err(InvalidRoomTransition { from, event }),
        }
    }
}

/// Host actions that move a room through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Begin the match.
    Start,
    /// Close the room, from the lobby or mid-game.
    Close,
}

/// Error returned when an event is not valid from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid room transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidRoomTransition {
    /// Status the room was in.
    pub from: RoomStatus,
    /// Rejected event.
    pub event: RoomEvent,
}

/// Why a start request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartRefused {
    /// Headcount does not satisfy the mode.
    #[error("{mode:?} mode cannot start with {count} players")]
    Headcount {
        /// Room mode.
        mode: Mode,
        /// Players counted for the session kind.
        count: usize,
    },
    /// The lifecycle forbids starting.
    #[error(transparent)]
    Lifecycle(#[from] InvalidRoomTransition),
}

/// Guarded start: lifecycle and headcount must both allow it.
///
/// `count` is the number of members for online rooms and fictional players for solo ones.
pub fn check_start(status: RoomStatus, mode: Mode, count: usize) -> Result<RoomStatus, StartRefused> {
    let next = status.apply(RoomEvent::Start)?;
    if !mode.accepts_headcount(count) {
        return Err(StartRefused::Headcount { mode, count });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RoomStatus; 3] = [RoomStatus::Waiting, RoomStatus::InGame, RoomStatus::Ended];

    #[test]
    fn lifecycle_follows_allowed_paths() {
        assert_eq!(RoomStatus::Waiting.apply(RoomEvent::Start), Ok(RoomStatus::InGame));
        assert_eq!(RoomStatus::InGame.apply(RoomEvent::Close), Ok(RoomStatus::Ended));
        assert_eq!(RoomStatus::Waiting.apply(RoomEvent::Close), Ok(RoomStatus::Ended));
    }

    #[test]
    fn status_never_decreases() {
        for from in ALL {
            for event in [RoomEvent::Start, RoomEvent::Close] {
                if let Ok(to) = from.apply(event) {
                    assert!(to > from, "{from:?} -> {to:?}");
                }
            }
        }
    }

    #[test]
    fn ended_rooms_accept_nothing() {
        let err = RoomStatus::Ended.apply(RoomEvent::Close).unwrap_err();
        assert_eq!(err.from, RoomStatus::Ended);
        assert!(RoomStatus::InGame.apply(RoomEvent::Start).is_err());
    }

    #[test]
    fn start_guard_checks_headcount() {
        let refused = check_start(RoomStatus::Waiting, Mode::Couple, 3);
        assert_eq!(
            refused,
            Err(StartRefused::Headcount {
                mode: Mode::Couple,
                count: 3
            })
        );
        assert_eq!(
            check_start(RoomStatus::Waiting, Mode::Group, 3),
            Ok(RoomStatus::InGame)
        );
        assert!(matches!(
            check_start(RoomStatus::Ended, Mode::Group, 4),
            Err(StartRefused::Lifecycle(_))
        ));
    }
}
