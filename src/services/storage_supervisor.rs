use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{record_store::RecordStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a record store installed, dropping into degraded mode while it is unreachable.
///
/// `connect` is retried with exponential backoff until it succeeds. Once connected the
/// store is health-checked periodically; a failed check triggers bounded in-place
/// reconnects before starting over with a fresh connection.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RecordStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_store(store.clone()).await;
                info!("record store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                monitor(&state, store.as_ref()).await;
                warn!("record store lost; reconnecting from scratch");
            }
            Err(err) => {
                warn!(error = %err, "record store connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the store until it fails and cannot be recovered in place.
async fn monitor(state: &SharedState, store: &dyn RecordStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("record store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "record store health check failed");
                if !recover(state, store).await {
                    return;
                }
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Bounded in-place reconnects. Enters degraded mode on the first failure.
async fn recover(state: &SharedState, store: &dyn RecordStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "record store reconnected after a failed health check");
                state.update_degraded(false).await;
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "record store reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "record store reconnect failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    warn!("exhausted record store reconnect attempts; staying in degraded mode");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::record_store::memory::MemoryRecordStore, state::AppState};

    #[tokio::test]
    async fn connecting_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut degraded = state.degraded_watcher();
        assert!(*degraded.borrow());

        let supervisor = tokio::spawn(run(state.clone(), || async {
            Ok(Arc::new(MemoryRecordStore::new()) as Arc<dyn RecordStore>)
        }));

        tokio::time::timeout(Duration::from_secs(2), degraded.wait_for(|value| !*value))
            .await
            .expect("left degraded mode in time")
            .expect("state alive");
        assert!(state.store().await.is_some());
        supervisor.abort();
    }

    #[tokio::test]
    async fn successful_reconnects_clear_degraded_mode() {
        let state = AppState::with_memory_store().await;
        state.update_degraded(true).await;

        assert!(recover(&state, &MemoryRecordStore::new()).await);
        assert!(!state.is_degraded().await);
    }
}
