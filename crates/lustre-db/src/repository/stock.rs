//! # Stock Writes
//!
//! Conditional stock updates shared by `settings` and `items`.
//!
//! ## Compare-And-Swap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reservation reads {stock, version}, then:                              │
//! │                                                                         │
//! │    UPDATE <table>                                                       │
//! │    SET    stock = stock - :qty, version = version + 1                   │
//! │    WHERE  id = :id AND version = :observed AND stock >= :qty            │
//! │                                                                         │
//! │  1 row  → reserved, nobody touched the row since we read it             │
//! │  0 rows → somebody did; re-read and re-validate                         │
//! │                                                                         │
//! │  The `stock >= :qty` guard and the table CHECK (stock >= 0) make it     │
//! │  impossible to go negative even if the version check were skipped.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use lustre_core::EntityKind;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Stock counter and concurrency version of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub stock: i64,
    pub version: i64,
}

/// Decrements stock if the row still has `observed_version` and enough stock.
///
/// ## Returns
/// * `Ok(true)` - Decremented
/// * `Ok(false)` - Lost the race (version moved or stock too low)
pub async fn try_decrement(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &str,
    quantity: i64,
    observed_version: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(kind = %kind, id = %id, quantity, observed_version, "Conditional stock decrement");

    let sql = format!(
        r#"
        UPDATE {}
        SET
            stock = stock - ?1,
            version = version + 1,
            updated_at = ?2
        WHERE id = ?3 AND version = ?4 AND stock >= ?5
        "#,
        kind.table()
    );

    let result = sqlx::query(&sql)
        .bind(quantity)
        .bind(now)
        .bind(id)
        .bind(observed_version)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Adds stock back (operator restock).
///
/// Unconditional delta update; bumps `version` so in-flight reservations
/// that read the old level re-validate.
pub async fn increment(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(kind = %kind, id = %id, quantity, "Restocking");

    let sql = format!(
        r#"
        UPDATE {}
        SET
            stock = stock + ?1,
            version = version + 1,
            updated_at = ?2
        WHERE id = ?3
        "#,
        kind.table()
    );

    let result = sqlx::query(&sql)
        .bind(quantity)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(kind.to_string(), id));
    }

    Ok(())
}
