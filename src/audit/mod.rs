//! The bitácora: an append-only ledger of field-level changes.
//!
//! [`AuditRecorder::record_mutation`] strips a mutation down to the fields whose value
//! actually changed and appends one row per call. It writes through whatever
//! connection it is handed, so a caller can put the audit insert in the same
//! transaction as the business change.

pub mod diff;
pub mod registry;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::AuditError;

pub use diff::{diff_snapshots, Diff, Snapshot, METADATA_FIELDS};
pub use registry::{AuditRegistry, EntityRegistration};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

/// The authenticated user and session behind a mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub session_id: i64,
}

/// One mutation handed to the recorder.
#[derive(Debug, Clone, Copy)]
pub struct Mutation<'a> {
    /// Entity table as registered, not the ledger name.
    pub table: &'a str,
    pub action: AuditAction,
    pub actor: Actor,
    pub prior: Option<&'a Snapshot>,
    pub new: Option<&'a Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub table_name: String,
    pub action: AuditAction,
    pub user_id: i64,
    pub session_id: i64,
    pub prior_values: Snapshot,
    pub new_values: Snapshot,
    pub created_at: String,
}

/// Writes ledger entries for registered entities.
#[derive(Clone)]
pub struct AuditRecorder {
    registry: Arc<AuditRegistry>,
}

impl AuditRecorder {
    pub fn new(registry: Arc<AuditRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AuditRegistry {
        &self.registry
    }

    pub fn is_enabled(&self, table: &str) -> bool {
        self.registry.is_enabled(table)
    }

    /// Diffs the mutation and appends one ledger row.
    ///
    /// Returns the new entry id, or `None` when the table is not opted in, in which
    /// case nothing is written. An empty diff is still recorded.
    pub async fn record_mutation(
        &self,
        conn: &mut SqliteConnection,
        mutation: Mutation<'_>,
    ) -> Result<Option<i64>, AuditError> {
        let registration = match self.registry.get(mutation.table) {
            Some(r) if r.enabled => r,
            _ => {
                debug!(table = mutation.table, "audit skipped, table not opted in");
                return Ok(None);
            }
        };

        if mutation.action == AuditAction::Create {
            if mutation.prior.is_some_and(|p| !p.is_empty()) {
                return Err(AuditError::InvalidMutation(format!(
                    "create on {} must not carry a prior state",
                    mutation.table
                )));
            }
            if mutation.new.is_none() {
                return Err(AuditError::InvalidMutation(format!(
                    "create on {} requires a new state",
                    mutation.table
                )));
            }
        }

        let diff = diff_snapshots(mutation.prior, mutation.new);
        let prior_values = serde_json::to_string(&diff.prior)?;
        let new_values = serde_json::to_string(&diff.new)?;
        let created_at = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO bitacora (table_name, action, user_id, session_id, prior_values, new_values, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               RETURNING id"#,
        )
        .bind(&registration.audit_name)
        .bind(mutation.action.as_str())
        .bind(mutation.actor.user_id)
        .bind(mutation.actor.session_id)
        .bind(prior_values)
        .bind(new_values)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(AuditError::WriteFailed)?;

        debug!(
            entry_id = id,
            table = %registration.audit_name,
            action = %mutation.action,
            user_id = mutation.actor.user_id,
            changed = ?diff.changed_fields(),
            "audit entry recorded"
        );
        Ok(Some(id))
    }
}

/// Read-side filter for the ledger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub table: Option<String>,
    pub action: Option<AuditAction>,
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn decode_fragment(row: &SqliteRow, column: &str) -> Result<Snapshot, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn entry_from_row(row: &SqliteRow) -> Result<AuditEntry, sqlx::Error> {
    let action: String = row.try_get("action")?;
    let action = action
        .parse::<AuditAction>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    Ok(AuditEntry {
        id: row.try_get("id")?,
        table_name: row.try_get("table_name")?,
        action,
        user_id: row.try_get("user_id")?,
        session_id: row.try_get("session_id")?,
        prior_values: decode_fragment(row, "prior_values")?,
        new_values: decode_fragment(row, "new_values")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Lists ledger entries, newest first.
pub async fn list_entries(db: &SqlitePool, filter: &AuditFilter) -> Result<Vec<AuditEntry>, sqlx::Error> {
    let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = filter.offset.unwrap_or(0).max(0);

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, table_name, action, user_id, session_id, prior_values, new_values, created_at FROM bitacora WHERE 1 = 1",
    );
    if let Some(table) = &filter.table {
        qb.push(" AND table_name = ").push_bind(table.clone());
    }
    if let Some(action) = filter.action {
        qb.push(" AND action = ").push_bind(action.as_str());
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    qb.push(" ORDER BY id DESC LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb.build().fetch_all(db).await?;
    rows.iter().map(entry_from_row).collect()
}
