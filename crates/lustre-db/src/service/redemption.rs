//! # Discount Redemption Service
//!
//! Validates a code's eligibility and bumps its usage counter, inside the
//! caller's transaction. [`DiscountRedemptionService::check`] runs the same
//! checks read-only.
//!
//! ## Redemption Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  redeem(conn, raw_code, subtotal, customer, now)                        │
//! │                                                                         │
//! │   normalize(raw_code)                                                   │
//! │   ┌──► find_by_code ───────── missing ──► CodeNotFound                  │
//! │   │        │                                                            │
//! │   │   check_usable(now) ──── inactive / expired / global limit          │
//! │   │        │                                                            │
//! │   │   count_customer_redemptions ── ≥ per_customer_limit                │
//! │   │        │                                                            │
//! │   │   compute_discount(subtotal) ── unknown kind ──► InvalidCodeKind    │
//! │   │        │                                                            │
//! │   │   CAS used_count + 1 ──── 1 row ──► Ok(Redemption)                  │
//! │   │        │                                                            │
//! │   └─── 0 rows, attempts left (exhausted → ConcurrencyConflict)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use lustre_core::discount::normalize_code;
use lustre_core::{CoreError, CoreResult, DiscountCode, Money};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use super::RetryPolicy;
use crate::repository::discount;

/// A successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    /// Amount taken off the subtotal; `0 ≤ discount ≤ subtotal`.
    pub discount: Money,
    pub code_id: String,
    /// Normalized code.
    pub code: String,
}

/// A code that passed every redemption check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCheck {
    pub code: String,
    pub kind: String,
    /// What the code would take off the checked subtotal.
    pub discount_cents: i64,
    /// Uses left before the global limit; `None` when unlimited.
    pub remaining_uses: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Validates and redeems discount codes.
#[derive(Debug, Clone, Default)]
pub struct DiscountRedemptionService {
    retry: RetryPolicy,
}

impl DiscountRedemptionService {
    pub fn new(retry: RetryPolicy) -> Self {
        DiscountRedemptionService { retry }
    }

    /// Redeems `raw_code` for `customer_id` against `subtotal`.
    ///
    /// Checks run in a fixed order and the first failure wins, so a code
    /// that is both inactive and expired reports `CodeInactive`.
    pub async fn redeem(
        &self,
        conn: &mut SqliteConnection,
        raw_code: &str,
        subtotal: Money,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Redemption> {
        let code = normalize_code(raw_code);

        for attempt in 1..=self.retry.max_attempts {
            let (found, amount) =
                evaluate(&mut *conn, &code, subtotal, Some(customer_id), now).await?;

            if discount::try_increment_usage(&mut *conn, &found.id, found.version, now).await? {
                debug!(
                    code = %found.code,
                    customer_id = %customer_id,
                    discount_cents = amount.cents(),
                    used_count = found.used_count + 1,
                    "Redeemed discount code"
                );
                return Ok(Redemption {
                    discount: amount,
                    code_id: found.id,
                    code: found.code,
                });
            }

            warn!(code = %code, attempt, "Discount code changed concurrently, re-validating");
        }

        Err(CoreError::conflict(
            format!("discount code {code}"),
            self.retry.max_attempts,
        ))
    }

    /// Runs the redemption checks without redeeming.
    ///
    /// Nothing is written; `used_count` and `version` stay as they are. The
    /// per-customer limit is only checked when a customer is given.
    pub async fn check(
        &self,
        conn: &mut SqliteConnection,
        raw_code: &str,
        subtotal: Money,
        customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<CodeCheck> {
        let code = normalize_code(raw_code);
        let (found, amount) = evaluate(conn, &code, subtotal, customer_id, now).await?;

        debug!(code = %found.code, discount_cents = amount.cents(), "Discount code is redeemable");

        Ok(CodeCheck {
            remaining_uses: (found.global_limit > 0)
                .then(|| found.global_limit - found.used_count),
            code: found.code,
            kind: found.kind,
            discount_cents: amount.cents(),
            expires_at: found.expires_at,
        })
    }
}

/// Eligibility checks in order, then the discount amount.
async fn evaluate(
    conn: &mut SqliteConnection,
    code: &str,
    subtotal: Money,
    customer_id: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<(DiscountCode, Money)> {
    let found = discount::find_by_code(&mut *conn, code)
        .await?
        .ok_or_else(|| CoreError::CodeNotFound(code.to_string()))?;

    found.check_usable(now)?;

    if let Some(customer_id) = customer_id.filter(|_| found.per_customer_limit > 0) {
        let prior = discount::count_customer_redemptions(&mut *conn, customer_id, &found.id).await?;
        found.check_customer_limit(prior)?;
    }

    let amount = found.compute_discount(subtotal)?;
    Ok((found, amount))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{at, code, memory_db};

    #[tokio::test]
    async fn test_percentage_redemption_increments_usage() {
        let db = memory_db().await;
        db.discount_codes()
            .insert(&code("SPRING10", "percentage", 1_000))
            .await
            .unwrap();

        let service = DiscountRedemptionService::default();
        let mut tx = db.pool().begin().await.unwrap();
        let redemption = service
            .redeem(&mut tx, " spring10", Money::from_major(200), "cust-1", Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(redemption.discount, Money::from_major(20));
        assert_eq!(redemption.code, "SPRING10");

        let after = db.discount_codes().get_by_code("SPRING10").await.unwrap().unwrap();
        assert_eq!(after.used_count, 1);
    }

    #[tokio::test]
    async fn test_fixed_redemption_is_capped() {
        let db = memory_db().await;
        db.discount_codes()
            .insert(&code("BIG500", "fixed", 50_000))
            .await
            .unwrap();

        let service = DiscountRedemptionService::default();
        let mut conn = db.pool().acquire().await.unwrap();
        let redemption = service
            .redeem(&mut conn, "BIG500", Money::from_major(200), "cust-1", Utc::now())
            .await
            .unwrap();

        assert_eq!(redemption.discount, Money::from_major(200));
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let db = memory_db().await;
        let service = DiscountRedemptionService::default();
        let mut conn = db.pool().acquire().await.unwrap();

        let err = service
            .redeem(&mut conn, "NOPE", Money::from_major(10), "cust-1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CodeNotFound(ref c) if c == "NOPE"));
    }

    #[tokio::test]
    async fn test_expired_code_does_not_count_usage() {
        let db = memory_db().await;
        let mut expired = code("OLD", "fixed", 500);
        expired.expires_at = Some(at("2026-01-01T00:00:00Z"));
        db.discount_codes().insert(&expired).await.unwrap();

        let service = DiscountRedemptionService::default();
        let mut conn = db.pool().acquire().await.unwrap();
        let err = service
            .redeem(&mut conn, "OLD", Money::from_major(10), "cust-1", at("2026-02-01T00:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CodeExpired(_)));

        // same code is fine before expiry
        service
            .redeem(&mut conn, "OLD", Money::from_major(10), "cust-1", at("2025-12-01T00:00:00Z"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_legacy_kind_is_rejected_without_increment() {
        let db = memory_db().await;
        db.discount_codes()
            .import_unchecked(&code("LEGACY", "percent", 1_000))
            .await
            .unwrap();

        let service = DiscountRedemptionService::default();
        let mut conn = db.pool().acquire().await.unwrap();
        let err = service
            .redeem(&mut conn, "LEGACY", Money::from_major(100), "cust-1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCodeKind { .. }));

        let row = discount::find_by_code(&mut conn, "LEGACY").await.unwrap().unwrap();
        assert_eq!(row.used_count, 0);
    }

    #[tokio::test]
    async fn test_check_reports_discount_without_redeeming() {
        let db = memory_db().await;
        let mut limited = code("SPRING10", "percentage", 1_000);
        limited.global_limit = 5;
        limited.used_count = 2;
        db.discount_codes().insert(&limited).await.unwrap();

        let service = DiscountRedemptionService::default();
        let mut conn = db.pool().acquire().await.unwrap();
        for _ in 0..3 {
            let check = service
                .check(&mut conn, "spring10", Money::from_major(200), None, Utc::now())
                .await
                .unwrap();
            assert_eq!(check.discount_cents, 2_000);
            assert_eq!(check.remaining_uses, Some(3));
        }

        let row = discount::find_by_code(&mut conn, "SPRING10").await.unwrap().unwrap();
        assert_eq!(row.used_count, 2);
        assert_eq!(row.version, 0);
    }

    #[tokio::test]
    async fn test_check_applies_the_redemption_rules() {
        let db = memory_db().await;
        let mut exhausted = code("GONE", "fixed", 500);
        exhausted.global_limit = 1;
        exhausted.used_count = 1;
        db.discount_codes().insert(&exhausted).await.unwrap();
        let mut paused = code("PAUSED", "fixed", 500);
        paused.active = false;
        db.discount_codes().insert(&paused).await.unwrap();

        let service = DiscountRedemptionService::default();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        let err = service
            .check(&mut conn, "GONE", Money::from_major(10), None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::GlobalLimitReached(_)));

        let err = service
            .check(&mut conn, "PAUSED", Money::from_major(10), None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CodeInactive(_)));

        let err = service
            .check(&mut conn, "MISSING", Money::from_major(10), None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CodeNotFound(_)));
    }
}
