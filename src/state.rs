use std::sync::Arc;

use tracing::info;

use crate::audit::{AuditRecorder, AuditRegistry};
use crate::config::AppConfig;
use crate::folio::{FolioAdmin, FolioAllocator};
use crate::metrics::Metrics;
use crate::store::EntityStore;

/// The shared application state.
///
/// Every service holds a clone of the same pool handle; the pool itself is created
/// and closed by the binary.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// The application metrics.
    pub metrics: Metrics,
    pub folios: FolioAllocator,
    /// Only reachable from the admin router.
    pub folio_admin: FolioAdmin,
    pub store: EntityStore,
}

impl AppState {
    /// Creates a new `AppState`, building the audit registry from `config.audit`.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let registry = Arc::new(AuditRegistry::from_config(&config.audit));
        let (entities, audited) = registry.counts();
        info!(entities, audited, policy = ?config.audit.policy, "audit registry loaded");
        let metrics = Metrics::new();
        let recorder = AuditRecorder::new(registry);
        let store = EntityStore::new(db.clone(), recorder, config.audit.policy, metrics.clone());

        Self {
            folios: FolioAllocator::new(db.clone()),
            folio_admin: FolioAdmin::new(db.clone()),
            store,
            db,
            config: Arc::new(config),
            metrics,
        }
    }
}
