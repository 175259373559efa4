use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    error::AppError,
    routes::caller::MaybeCaller,
    services::websocket_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{code}/ws",
    tag = "reactions",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 404, description = "Unknown code"),
        (status = 409, description = "Room has ended")
    )
)]
/// Upgrade into a reaction socket bound to the room.
pub async fn ws_handler(
    State(state): State<SharedState>,
    MaybeCaller(caller): MaybeCaller,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let target = websocket_service::reaction_target(&state, &code).await?;
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, target, caller)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/ws", get(ws_handler))
}
