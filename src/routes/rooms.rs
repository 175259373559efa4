use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::room::{CreateRoomRequest, JoinResponse, RoomSettingsRequest, RoomView},
    error::AppError,
    routes::caller::{Caller, MaybeCaller},
    services::room_service,
    state::SharedState,
};

/// Room lifecycle routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/settings", put(update_settings))
        .route("/rooms/{code}/start", post(start_room))
        .route("/rooms/{code}/close", post(close_room))
}

/// Open a room hosted by the caller.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomView),
        (status = 400, description = "Invalid fictional players"),
        (status = 401, description = "Missing identity")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::create_room(&state, &caller, payload).await?;
    Ok(Json(room))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room join code, case-insensitive")),
    responses(
        (status = 200, description = "Room found", body = RoomView),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::room_view(&state, &code).await?))
}

/// Join a room by code, or learn where the host should go.
///
/// Anonymous callers get a 401 carrying the code to resume with after signing in.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Room join code, case-insensitive")),
    responses(
        (status = 200, description = "Joined or routed", body = JoinResponse),
        (status = 401, description = "Sign in first; body carries `pending_room_code`"),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    MaybeCaller(caller): MaybeCaller,
    Path(code): Path<String>,
) -> Result<Json<JoinResponse>, AppError> {
    let response = room_service::join(&state, caller.as_deref(), &code).await?;
    Ok(Json(response))
}

/// Edit the allowlist, punishment and escalation of a room.
#[utoipa::path(
    put,
    path = "/rooms/{code}/settings",
    tag = "rooms",
    params(("code" = String, Path, description = "Room join code")),
    request_body = RoomSettingsRequest,
    responses(
        (status = 200, description = "Settings stored", body = RoomView),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Room has ended")
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<RoomSettingsRequest>>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::update_settings(&state, &caller, &code, payload).await?;
    Ok(Json(room))
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "rooms",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Match started", body = RoomView),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Headcount or lifecycle refuses the start")
    )
)]
pub async fn start_room(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::start(&state, &caller, &code).await?))
}

/// Close a room and persist its summary.
#[utoipa::path(
    post,
    path = "/rooms/{code}/close",
    tag = "rooms",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Room closed", body = RoomView),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Room already ended")
    )
)]
pub async fn close_room(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::close(&state, &caller, &code).await?))
}
