use axum::{extract::FromRequestParts, http::request::Parts};

use crate::audit::Actor;
use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

fn positive_header(parts: &Parts, name: &str) -> Result<i64, AppError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", name)))?;
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| AppError::Unauthorized(format!("{} must be a positive integer", name)))
}

/// Actor context set by the token-verifying gateway in front of this service.
///
/// Rejects before the handler runs, so no storage is touched without an actor.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor {
            user_id: positive_header(parts, USER_ID_HEADER)?,
            session_id: positive_header(parts, SESSION_ID_HEADER)?,
        })
    }
}
