use tracing::{debug, warn};

use crate::{
    dao::models::RoomUpdate,
    state::{SharedState, session::HostSession},
};

/// Write the session's full snapshot and ledger to the room row so observers converge on it.
///
/// Called after every committed transition. A failed write is logged and not
/// retried; the next transition writes the full state again. Returns whether the
/// write landed.
pub async fn replicate_snapshot(state: &SharedState, session: &HostSession) -> bool {
    let room = session.room();
    let Some(store) = state.store().await else {
        warn!(room = %room.code, "snapshot not replicated: storage unavailable");
        return false;
    };

    let snapshot = session.snapshot();
    let round = snapshot.round;
    let update = RoomUpdate {
        turn_snapshot: Some(snapshot),
        session_ledger: Some(session.ledger()),
        ..RoomUpdate::default()
    };

    match store.update_room(room.id, update).await {
        Ok(Some(_)) => {
            debug!(room = %room.code, round, "snapshot replicated");
            true
        }
        Ok(None) => {
            warn!(room = %room.code, round, "snapshot not replicated: room row missing");
            false
        }
        Err(err) => {
            warn!(room = %room.code, round, error = %err, "snapshot write failed");
            false
        }
    }
}
