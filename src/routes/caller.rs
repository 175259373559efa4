//! Caller identity taken from the `x-player-id` header.
//!
//! Authentication happens upstream; the backend only needs a stable opaque id.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, state::catalog::PlayerId};

/// Header carrying the caller's identity.
pub const PLAYER_ID_HEADER: &str = "x-player-id";
const MAX_ID_LEN: usize = 128;

/// Required caller identity.
#[derive(Debug, Clone)]
pub struct Caller(pub PlayerId);

/// Caller identity when the route also serves anonymous clients.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<PlayerId>);

fn identity(parts: &Parts) -> Option<PlayerId> {
    let value = parts.headers.get(PLAYER_ID_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty() && value.len() <= MAX_ID_LEN).then(|| value.to_owned())
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity(parts).map(Caller).ok_or_else(|| AppError::Unauthorized {
            message: format!("missing or invalid `{PLAYER_ID_HEADER}` header"),
            pending_room_code: None,
        })
    }
}

impl<S> FromRequestParts<S> for MaybeCaller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(identity(parts)))
    }
}
