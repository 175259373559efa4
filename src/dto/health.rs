use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Rooms with a live host session in this process.
    pub live_sessions: usize,
}

impl HealthResponse {
    /// Build a response from the degraded flag.
    pub fn new(degraded: bool, live_sessions: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            live_sessions,
        }
    }
}
