use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    audit::{Actor, Snapshot},
    error::{AppResult, OptionExt},
    state::AppState,
    store::{AuditOutcome, MutationOutcome, Record},
};

pub const AUDIT_WARNING_HEADER: &str = "x-audit-warning";

/// Serializes the outcome and flags a committed-but-unaudited mutation in a header.
fn outcome_response(status: StatusCode, outcome: MutationOutcome) -> Response {
    let warning = match &outcome.audit {
        AuditOutcome::Failed { .. } => Some(HeaderValue::from_static("audit entry not recorded")),
        _ => None,
    };
    let mut response = (status, Json(outcome)).into_response();
    if let Some(value) = warning {
        response.headers_mut().insert(HeaderName::from_static(AUDIT_WARNING_HEADER), value);
    }
    response
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    actor: Actor,
    Json(fields): Json<Snapshot>,
) -> AppResult<Response> {
    let outcome = state.store.create(&entity, actor, fields).await?;
    Ok(outcome_response(StatusCode::CREATED, outcome))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
) -> AppResult<Json<Record>> {
    let record = state.store.get(&entity, id).await?.ok_or_not_found("Record")?;
    Ok(Json(record))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
    actor: Actor,
    Json(patch): Json<Snapshot>,
) -> AppResult<Response> {
    let outcome = state.store.update(&entity, id, actor, patch).await?;
    Ok(outcome_response(StatusCode::OK, outcome))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
    actor: Actor,
) -> AppResult<Response> {
    let outcome = state.store.soft_delete(&entity, id, actor).await?;
    Ok(outcome_response(StatusCode::OK, outcome))
}
