use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    audit::Actor,
    error::{AppResult, FolioError},
    folio::Scope,
    state::AppState,
    types::{
        AllocateBatchRequest, AllocateRequest, FolioBatchResponse, FolioResponse, LastIssuedResponse,
        ResetResponse, ScopeExistsResponse, YearQuery,
    },
};

fn track_failure(state: &AppState, err: &FolioError) {
    if matches!(err, FolioError::AllocationFailed(_)) {
        state.metrics.inc_allocation_failures();
    }
}

pub async fn allocate(
    State(state): State<AppState>,
    Path(subsystem): Path<String>,
    actor: Actor,
    body: Option<Json<AllocateRequest>>,
) -> AppResult<impl IntoResponse> {
    let year = body.and_then(|Json(b)| b.year);
    let folio = state
        .folios
        .allocate(&subsystem, actor.user_id, year)
        .await
        .inspect_err(|e| track_failure(&state, e))?;
    state.metrics.add_folios(1);
    Ok((StatusCode::CREATED, Json(FolioResponse { folio })))
}

pub async fn allocate_batch(
    State(state): State<AppState>,
    Path(subsystem): Path<String>,
    actor: Actor,
    Json(req): Json<AllocateBatchRequest>,
) -> AppResult<impl IntoResponse> {
    let folios = state
        .folios
        .allocate_batch(&subsystem, req.count, actor.user_id, req.year)
        .await
        .inspect_err(|e| track_failure(&state, e))?;
    state.metrics.add_folios(folios.len() as u64);
    state.metrics.inc_folio_batches();
    Ok((StatusCode::CREATED, Json(FolioBatchResponse { count: folios.len(), folios })))
}

pub async fn peek_next(
    State(state): State<AppState>,
    Path(subsystem): Path<String>,
    Query(q): Query<YearQuery>,
) -> AppResult<Json<FolioResponse>> {
    let folio = state.folios.peek_next(&subsystem, q.year).await?;
    Ok(Json(FolioResponse { folio }))
}

pub async fn last_issued(
    State(state): State<AppState>,
    Path(subsystem): Path<String>,
    Query(q): Query<YearQuery>,
) -> AppResult<Json<LastIssuedResponse>> {
    let scope = Scope::new(&subsystem, q.year)?;
    let folio = state.folios.last_issued(scope.subsystem(), Some(scope.year())).await?;
    Ok(Json(LastIssuedResponse {
        subsystem: scope.subsystem().to_string(),
        year: scope.year(),
        folio,
    }))
}

pub async fn exists_scope(
    State(state): State<AppState>,
    Path(subsystem): Path<String>,
    Query(q): Query<YearQuery>,
) -> AppResult<Json<ScopeExistsResponse>> {
    let scope = Scope::new(&subsystem, q.year)?;
    let exists = state.folios.exists_scope(scope.subsystem(), Some(scope.year())).await?;
    Ok(Json(ScopeExistsResponse {
        subsystem: scope.subsystem().to_string(),
        year: scope.year(),
        exists,
    }))
}

/// Administrative reset. Mounted only on the admin router.
pub async fn reset(
    State(state): State<AppState>,
    Path((subsystem, year)): Path<(String, i32)>,
    actor: Actor,
) -> AppResult<Json<ResetResponse>> {
    let scope = Scope::new(&subsystem, Some(year))?;
    let reset = state.folio_admin.reset(scope.subsystem(), scope.year(), actor.user_id).await?;
    Ok(Json(ResetResponse {
        subsystem: scope.subsystem().to_string(),
        year: scope.year(),
        reset,
    }))
}
