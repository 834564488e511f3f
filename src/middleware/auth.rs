use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AppConfig;
use crate::error::AppError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Requires `Authorization: Bearer <token>` when `security.api_token` is configured.
///
/// Without a configured token the middleware is a no-op.
pub async fn auth_middleware(State(cfg): State<Arc<AppConfig>>, req: Request, next: Next) -> Response {
    let Some(expected) = cfg.security.api_token() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => next.run(req).await,
        _ => AppError::Unauthorized("missing or invalid bearer token".into()).into_response(),
    }
}

/// Guards administrative routes with `x-admin-token`.
///
/// Without a configured admin token every administrative route answers 403.
pub async fn admin_middleware(State(cfg): State<Arc<AppConfig>>, req: Request, next: Next) -> Response {
    let Some(expected) = cfg.security.admin_token() else {
        return AppError::Forbidden("administrative routes are disabled".into()).into_response();
    };

    let provided = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|h| h.to_str().ok());
    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => next.run(req).await,
        _ => {
            tracing::warn!(uri = %req.uri(), "rejected administrative request");
            AppError::Forbidden("invalid admin token".into()).into_response()
        }
    }
}
