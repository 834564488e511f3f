//! Generic document store for catalog entities.
//!
//! Every mutation goes through [`EntityStore::finish`], which hands the before and
//! after snapshots to the [`AuditRecorder`] according to the configured
//! [`AuditPolicy`]. Whether an entity is audited is decided by the registry, never
//! by the caller.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::audit::{AuditAction, AuditRecorder, Actor, Mutation, Snapshot, METADATA_FIELDS};
use crate::config::AuditPolicy;
use crate::error::{AuditError, StoreError};
use crate::metrics::Metrics;

const RECORD_COLUMNS: &str = "id, entity, data, estado, created_by, updated_by, created_at, updated_at";

/// Soft-delete flag; stored in its own column rather than in `data`.
pub const STATUS_FIELD: &str = "estado";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    pub entity: String,
    pub data: Snapshot,
    pub estado: bool,
    pub created_by: i64,
    pub updated_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record {
    /// The record as the audit recorder sees it, metadata columns included.
    pub fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), Value::from(self.id));
        for (k, v) in &self.data {
            snap.insert(k.clone(), v.clone());
        }
        snap.insert(STATUS_FIELD.into(), Value::from(self.estado));
        snap.insert("created_by".into(), Value::from(self.created_by));
        snap.insert("updated_by".into(), self.updated_by.map(Value::from).unwrap_or(Value::Null));
        snap.insert("created_at".into(), Value::from(self.created_at.clone()));
        snap.insert("updated_at".into(), Value::from(self.updated_at.clone()));
        snap
    }
}

/// What happened to the audit entry of a mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Recorded { entry_id: i64 },
    /// The entity is not opted in.
    Skipped,
    /// Best-effort policy only: the mutation committed, its audit entry did not.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub record: Record,
    pub audit: AuditOutcome,
}

#[derive(Clone)]
pub struct EntityStore {
    db: SqlitePool,
    recorder: AuditRecorder,
    policy: AuditPolicy,
    metrics: Metrics,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn record_from_row(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let raw: String = row.try_get("data")?;
    let data: Snapshot = serde_json::from_str(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Record {
        id: row.try_get("id")?,
        entity: row.try_get("entity")?,
        data,
        estado: row.try_get("estado")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Moves `estado` out of the caller's fields and rejects reserved ones.
fn split_status(fields: Snapshot) -> Result<(Snapshot, Option<bool>), StoreError> {
    let mut data = Snapshot::new();
    let mut estado = None;
    for (key, value) in fields {
        if key == "id" || METADATA_FIELDS.contains(&key.as_str()) {
            return Err(StoreError::InvalidData(format!("field {} is managed by the store", key)));
        }
        if key == STATUS_FIELD {
            match value {
                Value::Bool(b) => estado = Some(b),
                other => {
                    return Err(StoreError::InvalidData(format!(
                        "{} must be a boolean, got {}",
                        STATUS_FIELD, other
                    )))
                }
            }
            continue;
        }
        data.insert(key, value);
    }
    Ok((data, estado))
}

impl EntityStore {
    pub fn new(db: SqlitePool, recorder: AuditRecorder, policy: AuditPolicy, metrics: Metrics) -> Self {
        Self { db, recorder, policy, metrics }
    }

    fn ensure_registered(&self, entity: &str) -> Result<(), StoreError> {
        if self.recorder.registry().is_registered(entity) {
            Ok(())
        } else {
            Err(StoreError::UnknownEntity(entity.to_string()))
        }
    }

    pub async fn get(&self, entity: &str, id: i64) -> Result<Option<Record>, StoreError> {
        self.ensure_registered(entity)?;
        let mut conn = self.db.acquire().await?;
        Ok(fetch_record(&mut conn, entity, id).await?)
    }

    pub async fn create(&self, entity: &str, actor: Actor, fields: Snapshot) -> Result<MutationOutcome, StoreError> {
        self.ensure_registered(entity)?;
        let (data, estado) = split_status(fields)?;
        let data = serde_json::to_string(&data).map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let mut tx = self.db.begin().await?;
        let row = sqlx::query(&format!(
            "INSERT INTO records (entity, data, estado, created_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(entity)
        .bind(data)
        .bind(estado.unwrap_or(true))
        .bind(actor.user_id)
        .bind(now_rfc3339())
        .fetch_one(&mut *tx)
        .await?;
        let record = record_from_row(&row)?;
        debug!(entity, id = record.id, "record created");

        self.finish(tx, AuditAction::Create, actor, None, record).await
    }

    /// Merges `patch` into the stored fields.
    pub async fn update(
        &self,
        entity: &str,
        id: i64,
        actor: Actor,
        patch: Snapshot,
    ) -> Result<MutationOutcome, StoreError> {
        self.ensure_registered(entity)?;
        let (patch, estado) = split_status(patch)?;

        let mut tx = self.db.begin().await?;
        let current = claim_record(&mut tx, entity, id).await?;
        let prior = current.snapshot();

        let mut data = current.data;
        for (k, v) in patch {
            data.insert(k, v);
        }
        let record = write_record(&mut tx, entity, id, &data, estado.unwrap_or(current.estado), actor).await?;
        debug!(entity, id, "record updated");

        self.finish(tx, AuditAction::Update, actor, Some(prior), record).await
    }

    /// Marks the record inactive. Audited as a delete whose diff is the status flag.
    pub async fn soft_delete(&self, entity: &str, id: i64, actor: Actor) -> Result<MutationOutcome, StoreError> {
        self.ensure_registered(entity)?;

        let mut tx = self.db.begin().await?;
        let current = claim_record(&mut tx, entity, id).await?;
        let prior = current.snapshot();

        let record = write_record(&mut tx, entity, id, &current.data, false, actor).await?;
        debug!(entity, id, "record deactivated");

        self.finish(tx, AuditAction::Delete, actor, Some(prior), record).await
    }

    async fn finish(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        action: AuditAction,
        actor: Actor,
        prior: Option<Snapshot>,
        record: Record,
    ) -> Result<MutationOutcome, StoreError> {
        let new = record.snapshot();
        let mutation = Mutation {
            table: &record.entity,
            action,
            actor,
            prior: prior.as_ref(),
            new: Some(&new),
        };

        let audit = match self.policy {
            AuditPolicy::Strict => {
                // Dropping `tx` on error rolls the mutation back.
                let entry = self.recorder.record_mutation(&mut tx, mutation).await.map_err(|e| {
                    self.note_audit_error(&e);
                    e
                })?;
                tx.commit().await?;
                self.count(entry)
            }
            AuditPolicy::BestEffort => {
                tx.commit().await?;
                self.record_detached(mutation).await
            }
        };

        Ok(MutationOutcome { record, audit })
    }

    async fn record_detached(&self, mutation: Mutation<'_>) -> AuditOutcome {
        let result = match self.db.acquire().await {
            Ok(mut conn) => self.recorder.record_mutation(&mut conn, mutation).await,
            Err(e) => Err(AuditError::WriteFailed(e)),
        };
        match result {
            Ok(entry) => self.count(entry),
            Err(e) => {
                self.note_audit_error(&e);
                warn!(
                    table = mutation.table,
                    action = %mutation.action,
                    user_id = mutation.actor.user_id,
                    "mutation committed without audit entry: {}",
                    e
                );
                AuditOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Counts `WriteFailed` only.
    pub(crate) fn note_audit_error(&self, err: &AuditError) {
        if matches!(err, AuditError::WriteFailed(_)) {
            self.metrics.inc_audit_failures();
        }
    }

    fn count(&self, entry: Option<i64>) -> AuditOutcome {
        match entry {
            Some(entry_id) => {
                self.metrics.inc_audit_entries();
                AuditOutcome::Recorded { entry_id }
            }
            None => {
                self.metrics.inc_audit_skipped();
                AuditOutcome::Skipped
            }
        }
    }
}

/// Takes the write lock before reading. A deferred transaction whose first statement
/// is a read cannot upgrade after another writer commits and fails with `SQLITE_BUSY`.
async fn claim_record(conn: &mut SqliteConnection, entity: &str, id: i64) -> Result<Record, StoreError> {
    sqlx::query("UPDATE records SET updated_at = updated_at WHERE entity = ?1 AND id = ?2")
        .bind(entity)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    fetch_record(conn, entity, id)
        .await?
        .ok_or_else(|| StoreError::NotFound { entity: entity.to_string(), id })
}

async fn fetch_record(conn: &mut SqliteConnection, entity: &str, id: i64) -> Result<Option<Record>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM records WHERE entity = ?1 AND id = ?2",
        RECORD_COLUMNS
    ))
    .bind(entity)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(record_from_row).transpose()
}

async fn write_record(
    conn: &mut SqliteConnection,
    entity: &str,
    id: i64,
    data: &Snapshot,
    estado: bool,
    actor: Actor,
) -> Result<Record, StoreError> {
    let data = serde_json::to_string(data).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    let row = sqlx::query(&format!(
        "UPDATE records SET data = ?1, estado = ?2, updated_by = ?3, updated_at = ?4 \
         WHERE entity = ?5 AND id = ?6 RETURNING {}",
        RECORD_COLUMNS
    ))
    .bind(data)
    .bind(estado)
    .bind(actor.user_id)
    .bind(now_rfc3339())
    .bind(entity)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(record_from_row(&row)?)
}
