//! Observer side of the host-authoritative replication.
//!
//! The host session writes full snapshots to the room row; each observer stream
//! folds the resulting [`RecordChange`]s into an [`ObserverProjection`] and only
//! forwards what actually changed. Latest snapshot wins.

use crate::{
    dao::{change_feed::RecordChange, models::RoomEntity},
    state::{room::RoomStatus, session::TurnSnapshot},
};

/// What an observer has to re-render after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionUpdate {
    /// Replace the turn view.
    Snapshot(TurnSnapshot),
    /// The room status moved forward; carries the new row.
    Status(Box<RoomEntity>),
    /// Someone joined; the member list must be re-read.
    MembersChanged,
}

/// Read-only projection of one room held by an observer stream.
#[derive(Debug, Clone, Default)]
pub struct ObserverProjection {
    status: Option<RoomStatus>,
    snapshot: Option<TurnSnapshot>,
}

impl ObserverProjection {
    /// Projection primed with the room as it was when the stream opened.
    pub fn seeded(room: &RoomEntity) -> Self {
        Self {
            status: Some(room.status),
            snapshot: room.turn_snapshot.clone(),
        }
    }

    /// Last status seen.
    pub fn status(&self) -> Option<RoomStatus> {
        self.status
    }

    /// Last snapshot seen.
    pub fn snapshot(&self) -> Option<&TurnSnapshot> {
        self.snapshot.as_ref()
    }

    /// Fold a change into the projection and report what changed.
    ///
    /// A status older than the one already seen is ignored. When both the snapshot
    /// and the status changed, the status comes last so an `ended` room wins.
    pub fn apply(&mut self, change: RecordChange) -> Vec<ProjectionUpdate> {
        match change {
            RecordChange::MemberJoined { .. } => vec![ProjectionUpdate::MembersChanged],
            RecordChange::RoomUpdated(room) => {
                let mut updates = Vec::new();

                if let Some(snapshot) = room
                    .turn_snapshot
                    .as_ref()
                    .filter(|snapshot| self.snapshot.as_ref() != Some(*snapshot))
                {
                    self.snapshot = Some(snapshot.clone());
                    updates.push(ProjectionUpdate::Snapshot(snapshot.clone()));
                }

                if self.status.is_none_or(|seen| room.status > seen) {
                    self.status = Some(room.status);
                    updates.push(ProjectionUpdate::Status(room));
                }

                updates
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::state::{
        catalog::{Mode, SessionKind},
        turn::TurnPhase,
    };

    fn room(status: RoomStatus, round: Option<u32>) -> RoomEntity {
        RoomEntity {
            id: Uuid::nil(),
            code: "ABCDEF".into(),
            host_id: "ana".into(),
            mode: Mode::Couple,
            session_kind: SessionKind::Online,
            status,
            fictional_players: Vec::new(),
            active_categories: Mode::Couple.categories().to_vec(),
            punishment: None,
            escalation: false,
            turn_snapshot: round.map(|round| TurnSnapshot {
                phase: TurnPhase::Drawing,
                round,
                acting: None,
                partner: None,
                prompt: None,
                kind: None,
                is_penalty: false,
            }),
            session_ledger: None,
            summary: None,
            created_at: SystemTime::UNIX_EPOCH,
            ended_at: None,
        }
    }

    fn updated(room: RoomEntity) -> RecordChange {
        RecordChange::RoomUpdated(Box::new(room))
    }

    #[test]
    fn forwards_only_what_changed() {
        let mut projection = ObserverProjection::seeded(&room(RoomStatus::Waiting, None));

        let updates = projection.apply(updated(room(RoomStatus::InGame, Some(1))));
        assert!(matches!(
            updates.as_slice(),
            [ProjectionUpdate::Snapshot(_), ProjectionUpdate::Status(_)]
        ));

        assert!(projection.apply(updated(room(RoomStatus::InGame, Some(1)))).is_empty());

        let updates = projection.apply(updated(room(RoomStatus::InGame, Some(2))));
        assert!(matches!(updates.as_slice(), [ProjectionUpdate::Snapshot(s)] if s.round == 2));
        assert_eq!(projection.snapshot().map(|s| s.round), Some(2));
    }

    #[test]
    fn status_never_regresses() {
        let mut projection = ObserverProjection::seeded(&room(RoomStatus::Ended, Some(4)));
        assert!(projection.apply(updated(room(RoomStatus::InGame, Some(4)))).is_empty());
        assert_eq!(projection.status(), Some(RoomStatus::Ended));
    }

    #[test]
    fn joins_ask_for_a_member_refresh() {
        let mut projection = ObserverProjection::default();
        let updates = projection.apply(RecordChange::MemberJoined {
            room_id: Uuid::nil(),
            player_id: "bia".into(),
        });
        assert_eq!(updates, [ProjectionUpdate::MembersChanged]);
    }
}
