use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the degraded flag and live sessions while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded().await, state.live_sessions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let bare = AppState::new(AppConfig::default());
        assert_eq!(health_status(&bare).await.status, "degraded");

        let state = AppState::with_memory_store().await;
        let health = health_status(&state).await;
        assert_eq!((health.status.as_str(), health.live_sessions), ("ok", 0));
    }
}
