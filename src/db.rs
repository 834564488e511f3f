use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Opens the pool, creating the database file if missing.
///
/// The busy timeout lets concurrent writers queue on SQLite's write lock instead of
/// failing immediately, which the folio counter relies on under contention.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(15))
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Additional tuning (best-effort)
    if let Err(e) = sqlx::query("PRAGMA temp_store=MEMORY;").execute(pool).await {
        tracing::warn!("Failed to set temp_store: {}", e);
    }

    // folio counters: one row per (subsystem, year)
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS folio_counters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subsystem TEXT NOT NULL,
            year INTEGER NOT NULL,
            last_issued INTEGER NOT NULL DEFAULT 0 CHECK (last_issued >= 0),
            created_by INTEGER NOT NULL,
            updated_by INTEGER NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (subsystem, year)
        )"#,
    )
    .execute(pool)
    .await?;

    // bitacora: append-only audit ledger
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS bitacora (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('create', 'update', 'delete')),
            user_id INTEGER NOT NULL,
            session_id INTEGER NOT NULL,
            prior_values TEXT NOT NULL,
            new_values TEXT NOT NULL,
            created_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    // records: generic catalog documents behind the entity store
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity TEXT NOT NULL,
            data TEXT NOT NULL,
            estado INTEGER NOT NULL DEFAULT 1,
            created_by INTEGER NOT NULL,
            updated_by INTEGER NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_bitacora_table_created", "CREATE INDEX IF NOT EXISTS idx_bitacora_table_created ON bitacora(table_name, created_at DESC)"),
        ("idx_bitacora_user", "CREATE INDEX IF NOT EXISTS idx_bitacora_user ON bitacora(user_id)"),
        ("idx_records_entity", "CREATE INDEX IF NOT EXISTS idx_records_entity ON records(entity, id)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}
