use axum::Router;

use crate::state::SharedState;

pub mod caller;
pub mod catalog;
pub mod docs;
pub mod health;
pub mod players;
pub mod rooms;
pub mod sse;
pub mod turn;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(catalog::router())
        .merge(players::router())
        .merge(rooms::router())
        .merge(turn::router())
        .merge(sse::router())
        .merge(websocket::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
