//! # Database Migrations
//!
//! The schema lives in `migrations/sqlite/` at the workspace root and is
//! compiled into the binary.
//!
//! ```text
//! 001_initial_schema.sql
//!   settings ─┐                 orders ◄──── order_items (ON DELETE CASCADE)
//!   items ────┤ stock, version    │
//!             │                   └── discount_code_id ──► discount_codes
//!   discount_codes: used_count, version
//! ```
//!
//! Applied migrations are recorded in `_sqlx_migrations`. Published files are
//! never edited; schema changes go in a new `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(known = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
