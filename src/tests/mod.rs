//! In-crate tests.
//!
//! ## Test Modules
//!
//! - **folio_tests**: Folio formatting, batches, concurrency and the admin reset
//! - **audit_tests**: Ledger rows written by the recorder and the opt-in gate
//! - **store_tests**: Entity store mutations under both audit policies
//! - **api_tests**: HTTP routes end to end
//! - **health_api_tests**: Health, metrics and version endpoints
//! - **error_tests**: Error mapping and HTTP error responses
//! - **config_tests**: Configuration loading and validation
//! - **db_tests**: Schema initialization and constraints
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! cargo test folio_tests
//! ```

pub mod api_tests;
pub mod error_tests;

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::audit::{Actor, Snapshot};
use crate::config::{AppConfig, AuditConfig, AuditPolicy, EntityConfig};

/// A migrated on-disk database that lives as long as this value.
pub(crate) struct TestDb {
    pub pool: SqlitePool,
    pub url: String,
    _dir: TempDir,
}

pub(crate) async fn setup_test_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = crate::db::connect(&url, 8).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    TestDb { pool, url, _dir: dir }
}

pub(crate) fn actor() -> Actor {
    Actor { user_id: 7, session_id: 42 }
}

/// Registry used across tests: two audited tables and one opted out.
pub(crate) fn test_audit_config(policy: AuditPolicy) -> AuditConfig {
    AuditConfig {
        policy,
        entities: vec![
            EntityConfig {
                table: "ct_centros_trabajo".into(),
                audit_name: Some("centros_trabajo".into()),
                enabled: true,
            },
            EntityConfig { table: "inv_bienes".into(), audit_name: None, enabled: true },
            EntityConfig { table: "ct_tipos_documento".into(), audit_name: None, enabled: false },
        ],
    }
}

pub(crate) fn test_config(url: &str, policy: AuditPolicy) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = url.to_string();
    config.audit = test_audit_config(policy);
    config
}

pub(crate) fn snap(value: serde_json::Value) -> Snapshot {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}
