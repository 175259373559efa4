//! Six-character join codes over an unambiguous alphabet.

use rand::Rng;
use tracing::debug;

use crate::{
    dao::{models::RoomEntity, record_store::RecordStore, storage::StorageError},
    error::ServiceError,
};

/// Symbols used in room codes: no `I`, `O`, `0` or `1`.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Characters per code.
pub const CODE_LENGTH: usize = 6;

/// Draw a random code.
pub fn generate<R>(rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    (0..CODE_LENGTH)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Whether `code` has the right length and only alphabet symbols.
pub fn is_valid(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|byte| ALPHABET.contains(&byte))
}

/// Uppercase and trim user input; `None` when it cannot be a code.
pub fn normalize(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    is_valid(&code).then_some(code)
}

/// Insert `room` under a fresh code, retrying on collisions.
///
/// Gives up with [`ServiceError::Exhausted`] after `attempts` collisions.
pub async fn insert_with_fresh_code<R>(
    store: &dyn RecordStore,
    mut room: RoomEntity,
    attempts: usize,
    rng: &mut R,
) -> Result<RoomEntity, ServiceError>
where
    R: Rng + Send,
{
    for attempt in 1..=attempts {
        room.code = generate(rng);
        match store.insert_room(room.clone()).await {
            Ok(()) => return Ok(room),
            Err(StorageError::Conflict { .. }) => {
                debug!(attempt, code = %room.code, "room code taken; drawing another");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::Exhausted(format!(
        "no free room code after {attempts} attempts"
    )))
}
