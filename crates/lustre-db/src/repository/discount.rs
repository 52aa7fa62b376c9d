//! # Discount Code Repository
//!
//! Database operations for discount codes.
//!
//! ## Usage Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  used_count only moves inside an order transaction, by exactly one:     │
//! │                                                                         │
//! │    UPDATE discount_codes                                                │
//! │    SET    used_count = used_count + 1, version = version + 1            │
//! │    WHERE  id = :id AND version = :observed                              │
//! │      AND  (global_limit = 0 OR used_count < global_limit)               │
//! │                                                                         │
//! │  The limit guard sits in the WHERE clause, so even a writer that        │
//! │  skipped the version check could not push used_count past the limit.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use lustre_core::discount::normalize_code;
use lustre_core::validation::validate_new_discount_code;
use lustre_core::DiscountCode;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const SELECT_CODE: &str = r#"
    SELECT
        id, code, kind, value, global_limit, used_count, per_customer_limit,
        expires_at, active, version, created_at, updated_at
    FROM discount_codes
"#;

// =============================================================================
// Connection-level
// =============================================================================

/// Looks up a code by its normalized value.
pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<DiscountCode>> {
    let sql = format!("{SELECT_CODE} WHERE code = ?1");

    let found = sqlx::query_as::<_, DiscountCode>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found)
}

/// Looks up a code by ID.
pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<DiscountCode>> {
    let sql = format!("{SELECT_CODE} WHERE id = ?1");

    let found = sqlx::query_as::<_, DiscountCode>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found)
}

/// Number of this customer's orders that used the code.
pub async fn count_customer_redemptions(
    conn: &mut SqliteConnection,
    customer_id: &str,
    code_id: &str,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE customer_id = ?1 AND discount_code_id = ?2",
    )
    .bind(customer_id)
    .bind(code_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Increments `used_count` if the row still has `observed_version` and the
/// global limit has room.
///
/// ## Returns
/// * `Ok(true)` - Incremented
/// * `Ok(false)` - Lost the race
pub async fn try_increment_usage(
    conn: &mut SqliteConnection,
    id: &str,
    observed_version: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id = %id, observed_version, "Conditional usage increment");

    let result = sqlx::query(
        r#"
        UPDATE discount_codes
        SET
            used_count = used_count + 1,
            version = version + 1,
            updated_at = ?1
        WHERE id = ?2
          AND version = ?3
          AND (global_limit = 0 OR used_count < global_limit)
        "#,
    )
    .bind(now)
    .bind(id)
    .bind(observed_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Inserts a discount code on the given connection.
///
/// The code is normalized before validation, so `" spring10 "` is stored as
/// `SPRING10`.
pub async fn insert(conn: &mut SqliteConnection, code: &DiscountCode) -> DbResult<DiscountCode> {
    let code = DiscountCode {
        code: normalize_code(&code.code),
        ..code.clone()
    };
    validate_new_discount_code(&code)?;

    debug!(id = %code.id, code = %code.code, kind = %code.kind, "Inserting discount code");

    sqlx::query(
        r#"
        INSERT INTO discount_codes (
            id, code, kind, value, global_limit, used_count, per_customer_limit,
            expires_at, active, version, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10, ?11, ?12
        )
        "#,
    )
    .bind(&code.id)
    .bind(&code.code)
    .bind(&code.kind)
    .bind(code.value)
    .bind(code.global_limit)
    .bind(code.used_count)
    .bind(code.per_customer_limit)
    .bind(code.expires_at)
    .bind(code.active)
    .bind(code.version)
    .bind(code.created_at)
    .bind(code.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(code)
}

// =============================================================================
// Pool-level
// =============================================================================

/// Repository for discount code database operations.
#[derive(Debug, Clone)]
pub struct DiscountCodeRepository {
    pool: SqlitePool,
}

impl DiscountCodeRepository {
    /// Creates a new DiscountCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountCodeRepository { pool }
    }

    /// Gets a code by the value a customer would type (normalized here).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<DiscountCode>> {
        let mut conn = self.pool.acquire().await?;
        find_by_code(&mut conn, &normalize_code(code)).await
    }

    /// Gets a code by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DiscountCode>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    /// Creates a discount code.
    ///
    /// ## Returns
    /// * `Ok(DiscountCode)` - The stored (normalized) code
    /// * `Err(DbError::Invalid)` - Non-canonical kind, percentage > 100%, ...
    /// * `Err(DbError::UniqueViolation)` - Code already exists
    pub async fn insert(&self, code: &DiscountCode) -> DbResult<DiscountCode> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, code).await
    }

    /// Writes a code row without creation-time validation.
    ///
    /// For rows migrated from older systems, whose `kind` may not be
    /// canonical. Redemption still rejects such rows.
    pub async fn import_unchecked(&self, code: &DiscountCode) -> DbResult<()> {
        debug!(id = %code.id, code = %code.code, "Importing discount code");

        sqlx::query(
            r#"
            INSERT INTO discount_codes (
                id, code, kind, value, global_limit, used_count, per_customer_limit,
                expires_at, active, version, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(&code.id)
        .bind(normalize_code(&code.code))
        .bind(&code.kind)
        .bind(code.value)
        .bind(code.global_limit)
        .bind(code.used_count)
        .bind(code.per_customer_limit)
        .bind(code.expires_at)
        .bind(code.active)
        .bind(code.version)
        .bind(code.created_at)
        .bind(code.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Switches a code on or off.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE discount_codes SET active = ?1, version = version + 1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    fn code(raw: &str, kind: &str, value: i64, global_limit: i64) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: crate::repository::generate_id(),
            code: raw.to_string(),
            kind: kind.to_string(),
            value,
            global_limit,
            used_count: 0,
            per_customer_limit: 0,
            expires_at: None,
            active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_normalizes_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stored = db
            .discount_codes()
            .insert(&code(" spring10 ", "percentage", 1_000, 0))
            .await
            .unwrap();
        assert_eq!(stored.code, "SPRING10");

        let found = db.discount_codes().get_by_code("Spring10").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(stored.id));
    }

    #[tokio::test]
    async fn test_insert_rejects_percentage_over_hundred() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .discount_codes()
            .insert(&code("HUGE", "percentage", 12_000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_increment_respects_version_and_limit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stored = db
            .discount_codes()
            .insert(&code("ONCE", "fixed", 500, 1))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        // stale version
        assert!(!try_increment_usage(&mut conn, &stored.id, 7, now).await.unwrap());
        // current version
        assert!(try_increment_usage(&mut conn, &stored.id, 0, now).await.unwrap());
        // limit reached even with the right version
        assert!(!try_increment_usage(&mut conn, &stored.id, 1, now).await.unwrap());

        let reloaded = find_by_id(&mut conn, &stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded.used_count, 1);
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn test_set_active_bumps_version() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stored = db
            .discount_codes()
            .insert(&code("PAUSE", "fixed", 500, 0))
            .await
            .unwrap();

        assert!(db.discount_codes().set_active(&stored.id, false).await.unwrap());
        assert!(!db.discount_codes().set_active("missing", false).await.unwrap());

        let reloaded = db.discount_codes().get_by_code("PAUSE").await.unwrap().unwrap();
        assert!(!reloaded.active);
        assert_eq!(reloaded.version, 1);
    }
}
