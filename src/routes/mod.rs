//! HTTP route handlers.
//!
//! - `health`: liveness, readiness, metrics and version endpoints (no auth)
//! - `folios`: folio allocation and the administrative counter reset
//! - `records`: audited catalog mutations through the entity store
//! - `audit`: read-only ledger listing

pub mod audit;
pub mod folios;
pub mod health;
pub mod records;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::auth::{admin_middleware, auth_middleware};
use crate::state::AppState;

/// Builds the full router. Transport layers (tracing, compression, CORS) are added by the binary.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let admin = Router::new()
        .route("/admin/folios/{subsystem}/{year}/reset", post(folios::reset))
        .route_layer(from_fn_with_state(cfg.clone(), admin_middleware));

    let api = Router::new()
        .route("/folios/{subsystem}", post(folios::allocate))
        .route("/folios/{subsystem}/batch", post(folios::allocate_batch))
        .route("/folios/{subsystem}/next", get(folios::peek_next))
        .route("/folios/{subsystem}/last", get(folios::last_issued))
        .route("/folios/{subsystem}/exists", get(folios::exists_scope))
        .route("/records/{entity}", post(records::create_record))
        .route(
            "/records/{entity}/{id}",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/bitacora", get(audit::list_entries))
        .merge(admin)
        .route_layer(from_fn_with_state(cfg, auth_middleware));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .merge(api)
        .with_state(state)
}
