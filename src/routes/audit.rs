use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    audit::{self, AuditEntry, AuditFilter},
    error::AppResult,
    state::AppState,
};

// Ledger listing, newest first; read-only
pub async fn list_entries(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let entries = audit::list_entries(&state.db, &filter).await?;
    Ok(Json(entries))
}
