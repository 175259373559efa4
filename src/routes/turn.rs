use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::turn::{ChooseRequest, TurnView},
    error::AppError,
    routes::caller::Caller,
    services::turn_service,
    state::SharedState,
};

/// Host-only routes driving the turn cycle of an in-game room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{code}/turn", get(current_turn))
        .route("/rooms/{code}/turn/draw", post(draw))
        .route("/rooms/{code}/turn/choose", post(choose))
        .route("/rooms/{code}/turn/skip", post(skip))
        .route("/rooms/{code}/turn/advance", post(advance))
        .route("/rooms/{code}/turn/veto", post(veto))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/turn",
    tag = "turn",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Current turn", body = TurnView),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Room is not in game")
    )
)]
pub async fn current_turn(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<TurnView>, AppError> {
    Ok(Json(turn_service::view(&state, &caller, &code).await?))
}

/// Draw the acting player.
#[utoipa::path(
    post,
    path = "/rooms/{code}/turn/draw",
    tag = "turn",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Acting player drawn", body = TurnView),
        (status = 409, description = "Not waiting for a draw")
    )
)]
pub async fn draw(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<TurnView>, AppError> {
    Ok(Json(turn_service::draw(&state, &caller, &code).await?))
}

/// Pick truth or dare for the acting player.
///
/// When no compatible prompt exists the round is skipped and `notice` is set.
#[utoipa::path(
    post,
    path = "/rooms/{code}/turn/choose",
    tag = "turn",
    params(("code" = String, Path, description = "Room join code")),
    request_body = ChooseRequest,
    responses(
        (status = 200, description = "Prompt shown or round skipped", body = TurnView),
        (status = 409, description = "Not waiting for a choice")
    )
)]
pub async fn choose(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
    Json(payload): Json<ChooseRequest>,
) -> Result<Json<TurnView>, AppError> {
    Ok(Json(
        turn_service::choose(&state, &caller, &code, payload.kind).await?,
    ))
}

/// Replace the prompt with a penalty card.
#[utoipa::path(
    post,
    path = "/rooms/{code}/turn/skip",
    tag = "turn",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Penalty shown or round advanced", body = TurnView),
        (status = 409, description = "No prompt to skip")
    )
)]
pub async fn skip(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<TurnView>, AppError> {
    Ok(Json(turn_service::skip(&state, &caller, &code).await?))
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/turn/advance",
    tag = "turn",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Next round", body = TurnView),
        (status = 409, description = "No prompt on screen")
    )
)]
pub async fn advance(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<TurnView>, AppError> {
    Ok(Json(turn_service::advance(&state, &caller, &code).await?))
}

/// Spend the acting player's veto.
#[utoipa::path(
    post,
    path = "/rooms/{code}/turn/veto",
    tag = "turn",
    params(("code" = String, Path, description = "Room join code")),
    responses(
        (status = 200, description = "Veto spent, or `veto_exhausted` set", body = TurnView),
        (status = 409, description = "No prompt on screen")
    )
)]
pub async fn veto(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(code): Path<String>,
) -> Result<Json<TurnView>, AppError> {
    Ok(Json(turn_service::veto(&state, &caller, &code).await?))
}
