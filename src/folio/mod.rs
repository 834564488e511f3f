//! Folio allocation: gapless document numbers per (subsystem, year).
//!
//! Folios look like `INV-2025-00000007`. The counter row for a scope is created lazily
//! on the first allocation and every allocation advances it with a single
//! `INSERT .. ON CONFLICT DO UPDATE .. RETURNING` statement inside a transaction, so
//! concurrent callers never observe the same pre-increment value.
//!
//! Resetting a counter lives on [`FolioAdmin`], a separate type that the allocation
//! path never holds.

use chrono::{Datelike, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::FolioError;

/// Largest number of folios a single batch may reserve.
pub const MAX_BATCH: i64 = 1000;

const MAX_SUBSYSTEM_LEN: usize = 16;

const RESERVE_SQL: &str = r#"
    INSERT INTO folio_counters (subsystem, year, last_issued, created_by, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
    ON CONFLICT(subsystem, year) DO UPDATE SET
        last_issued = folio_counters.last_issued + excluded.last_issued,
        updated_by = excluded.created_by,
        updated_at = excluded.updated_at
    RETURNING last_issued, updated_by IS NULL AS started
"#;

/// Renders a folio. Sequences above 99,999,999 simply widen.
pub fn format_folio(subsystem: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:08}", subsystem, year, sequence)
}

/// A validated numbering scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    subsystem: String,
    year: i32,
}

impl Scope {
    /// Normalizes the subsystem code to uppercase and defaults the year to the current one.
    pub fn new(subsystem: &str, year: Option<i32>) -> Result<Self, FolioError> {
        let subsystem = subsystem.trim().to_ascii_uppercase();
        if subsystem.is_empty() {
            return Err(FolioError::Validation {
                field: "subsystem",
                message: "subsystem code must not be empty".to_string(),
            });
        }
        if subsystem.len() > MAX_SUBSYSTEM_LEN {
            return Err(FolioError::Validation {
                field: "subsystem",
                message: format!("subsystem code exceeds {} characters", MAX_SUBSYSTEM_LEN),
            });
        }
        // '-' separates the folio parts
        if !subsystem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FolioError::Validation {
                field: "subsystem",
                message: format!("subsystem code {} may only contain A-Z, 0-9 and '_'", subsystem),
            });
        }

        let year = year.unwrap_or_else(current_year);
        if !(1..=9999).contains(&year) {
            return Err(FolioError::Validation {
                field: "year",
                message: format!("year must be in 1..=9999, got {}", year),
            });
        }

        Ok(Self { subsystem, year })
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn format(&self, sequence: i64) -> String {
        format_folio(&self.subsystem, self.year, sequence)
    }
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn validate_count(count: i64) -> Result<(), FolioError> {
    if count <= 0 || count > MAX_BATCH {
        return Err(FolioError::Validation {
            field: "count",
            message: format!("count must be in 1..={}, got {}", MAX_BATCH, count),
        });
    }
    Ok(())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Result of one counter upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    /// Counter value after the reservation; the last sequence handed out.
    pub last: i64,
    /// The upsert inserted the scope's row.
    pub started: bool,
}

/// Issues folios. Holds only the pool handle; every call is one short transaction.
#[derive(Clone)]
pub struct FolioAllocator {
    db: SqlitePool,
}

impl FolioAllocator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Allocates the next folio of the scope, creating the counter at 1 if absent.
    pub async fn allocate(
        &self,
        subsystem: &str,
        actor_id: i64,
        year: Option<i32>,
    ) -> Result<String, FolioError> {
        let scope = Scope::new(subsystem, year)?;
        let last = self.reserve(&scope, 1, actor_id).await?.last;
        let folio = scope.format(last);
        debug!(subsystem = scope.subsystem(), year = scope.year(), actor_id, %folio, "folio issued");
        Ok(folio)
    }

    /// Reserves `count` contiguous folios with one counter update.
    ///
    /// The count is checked before any transaction is opened.
    pub async fn allocate_batch(
        &self,
        subsystem: &str,
        count: i64,
        actor_id: i64,
        year: Option<i32>,
    ) -> Result<Vec<String>, FolioError> {
        validate_count(count)?;
        let scope = Scope::new(subsystem, year)?;
        let last = self.reserve(&scope, count, actor_id).await?.last;
        let first = last - count + 1;
        let folios: Vec<String> = (first..=last).map(|seq| scope.format(seq)).collect();
        debug!(
            subsystem = scope.subsystem(),
            year = scope.year(),
            actor_id,
            first,
            last,
            "folio batch issued"
        );
        Ok(folios)
    }

    /// The folio the next allocation would return. Not a reservation.
    pub async fn peek_next(&self, subsystem: &str, year: Option<i32>) -> Result<String, FolioError> {
        let scope = Scope::new(subsystem, year)?;
        let last = self.read_last(&scope).await?.unwrap_or(0);
        Ok(scope.format(last + 1))
    }

    /// The last folio issued in the scope, or `None` when nothing was issued yet.
    pub async fn last_issued(
        &self,
        subsystem: &str,
        year: Option<i32>,
    ) -> Result<Option<String>, FolioError> {
        let scope = Scope::new(subsystem, year)?;
        Ok(self
            .read_last(&scope)
            .await?
            .filter(|last| *last > 0)
            .map(|last| scope.format(last)))
    }

    /// Whether a counter row exists for the scope.
    pub async fn exists_scope(&self, subsystem: &str, year: Option<i32>) -> Result<bool, FolioError> {
        let scope = Scope::new(subsystem, year)?;
        Ok(self.read_last(&scope).await?.is_some())
    }

    pub(crate) async fn reserve(&self, scope: &Scope, count: i64, actor_id: i64) -> Result<Reservation, FolioError> {
        let mut tx = self.db.begin().await.map_err(FolioError::AllocationFailed)?;
        let (last, started): (i64, bool) = sqlx::query_as(RESERVE_SQL)
            .bind(scope.subsystem())
            .bind(scope.year())
            .bind(count)
            .bind(actor_id)
            .bind(now_rfc3339())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                warn!(subsystem = scope.subsystem(), year = scope.year(), "folio reservation failed: {}", e);
                FolioError::AllocationFailed(e)
            })?;
        tx.commit().await.map_err(FolioError::AllocationFailed)?;

        // updated_by stays NULL until the row is touched a second time
        if started {
            info!(subsystem = scope.subsystem(), year = scope.year(), "folio counter started");
        }
        Ok(Reservation { last, started })
    }

    async fn read_last(&self, scope: &Scope) -> Result<Option<i64>, FolioError> {
        let row = sqlx::query("SELECT last_issued FROM folio_counters WHERE subsystem = ?1 AND year = ?2")
            .bind(scope.subsystem())
            .bind(scope.year())
            .fetch_optional(&self.db)
            .await
            .map_err(FolioError::AllocationFailed)?;
        Ok(row.map(|r| r.get::<i64, _>("last_issued")))
    }
}

/// Privileged counter maintenance, kept apart from [`FolioAllocator`].
#[derive(Clone)]
pub struct FolioAdmin {
    db: SqlitePool,
}

impl FolioAdmin {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Sets the scope's counter back to 0 so the next allocation yields sequence 1.
    ///
    /// Returns `false` without creating anything when the scope has no counter row.
    pub async fn reset(&self, subsystem: &str, year: i32, actor_id: i64) -> Result<bool, FolioError> {
        let scope = Scope::new(subsystem, Some(year))?;
        let mut tx = self.db.begin().await.map_err(FolioError::AllocationFailed)?;
        let result = sqlx::query(
            r#"UPDATE folio_counters
               SET last_issued = 0, updated_by = ?3, updated_at = ?4
               WHERE subsystem = ?1 AND year = ?2"#,
        )
        .bind(scope.subsystem())
        .bind(scope.year())
        .bind(actor_id)
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(FolioError::AllocationFailed)?;
        tx.commit().await.map_err(FolioError::AllocationFailed)?;

        let reset = result.rows_affected() > 0;
        if reset {
            warn!(subsystem = scope.subsystem(), year = scope.year(), actor_id, "folio counter reset");
        } else {
            info!(subsystem = scope.subsystem(), year = scope.year(), "reset skipped, scope has no counter");
        }
        Ok(reset)
    }
}
