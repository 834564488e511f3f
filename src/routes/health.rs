use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP bitacora_folios_issued Folios issued\n# TYPE bitacora_folios_issued counter\nbitacora_folios_issued {}\n\
# HELP bitacora_folio_batches Folio batches issued\n# TYPE bitacora_folio_batches counter\nbitacora_folio_batches {}\n\
# HELP bitacora_allocation_failures Failed folio allocations\n# TYPE bitacora_allocation_failures counter\nbitacora_allocation_failures {}\n\
# HELP bitacora_audit_entries Audit entries written\n# TYPE bitacora_audit_entries counter\nbitacora_audit_entries {}\n\
# HELP bitacora_audit_skipped Mutations on tables without auditing\n# TYPE bitacora_audit_skipped counter\nbitacora_audit_skipped {}\n\
# HELP bitacora_audit_failures Failed audit writes\n# TYPE bitacora_audit_failures counter\nbitacora_audit_failures {}\n\
# HELP bitacora_uptime_seconds Uptime seconds\n# TYPE bitacora_uptime_seconds gauge\nbitacora_uptime_seconds {}\n",
        m.folios_issued,
        m.folio_batches,
        m.allocation_failures,
        m.audit_entries,
        m.audit_skipped,
        m.audit_failures,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
