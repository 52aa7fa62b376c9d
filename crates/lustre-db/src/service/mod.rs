//! # Order Services
//!
//! The transactional half of order processing.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         OrderService                                    │
//! │                    (coordinator.rs, one tx per attempt)                 │
//! │                                                                         │
//! │   for each line ──► StockReservationEngine::reserve  (reservation.rs)   │
//! │                       setting ref, then item ref                        │
//! │                                                                         │
//! │   subtotal ───────► PricingPolicy::quote             (lustre-core)      │
//! │                                                                         │
//! │   code? ──────────► DiscountRedemptionService::redeem (redemption.rs)   │
//! │                                                                         │
//! │   totals ─────────► repository::order::insert ──► COMMIT                │
//! │                                                                         │
//! │   any error ──────► ROLLBACK (stock and used_count restored)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every component shares one [`RetryPolicy`]: the reservation and
//! redemption loops use it for row-level compare-and-swap retries, the
//! coordinator for whole-transaction restarts.

pub mod coordinator;
pub mod redemption;
pub mod reservation;

use backoff::ExponentialBackoff;
use std::time::Duration;

pub use coordinator::OrderService;
pub use redemption::{CodeCheck, DiscountRedemptionService, Redemption};
pub use reservation::StockReservationEngine;

/// Bounded retry with jittered exponential backoff.
///
/// ```text
/// attempt 1 ─fail─► sleep(~initial) ─► attempt 2 ─fail─► sleep(~initial × 2) ...
///                                   capped at max_backoff, up to max_attempts
/// ```
///
/// Each delay is randomized by ±50%.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt (before jitter).
    pub initial_backoff: Duration,
    /// Ceiling for the un-jittered delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: initial_backoff.max(DEFAULT_MAX_BACKOFF),
        }
    }

    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max.max(self.initial_backoff);
        self
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }

    /// Fresh delay schedule for one operation.
    ///
    /// Attempts are bounded by `max_attempts`, not by elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(500);

impl Default for RetryPolicy {
    /// 5 attempts, 20ms initial backoff, 500ms ceiling.
    fn default() -> Self {
        RetryPolicy::new(5, Duration::from_millis(20))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the service tests.

    use chrono::{DateTime, Utc};
    use lustre_core::{DiscountCode, SellableItem, SellableSetting};

    use crate::pool::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn setting(id: &str, price_cents: i64, stock: i64) -> SellableSetting {
        let now = Utc::now();
        SellableSetting {
            id: id.to_string(),
            title: format!("Setting {id}"),
            slug: format!("setting-{id}"),
            description: None,
            price_cents,
            metal_options: vec!["Platinum".to_string()],
            available_shapes: vec!["round".to_string()],
            features: vec![],
            images: vec![],
            stock,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(id: &str, price_cents: i64, stock: i64) -> SellableItem {
        let now = Utc::now();
        SellableItem {
            id: id.to_string(),
            sku: format!("SKU-{id}"),
            shape: Some("oval".to_string()),
            carat: Some(1.5),
            cut: Some("Ideal".to_string()),
            clarity: Some("VVS2".to_string()),
            color: Some("E".to_string()),
            lab_grown: false,
            certificate: Some("GIA 2211".to_string()),
            price_cents,
            stock,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn code(raw: &str, kind: &str, value: i64) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: format!("code-{}", raw.to_lowercase()),
            code: raw.to_string(),
            kind: kind.to_string(),
            value,
            global_limit: 0,
            used_count: 0,
            per_customer_limit: 0,
            expires_at: None,
            active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }
}
