//! # Order Transaction Coordinator
//!
//! Turns an [`OrderRequest`] into a committed [`Order`], or into nothing at
//! all.
//!
//! ## Transaction Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_order(request)                                                  │
//! │                                                                         │
//! │   validate_order_request ──── invalid ──► error (no storage access)     │
//! │        │                                                                │
//! │   ┌──► BEGIN IMMEDIATE (waits up to busy_timeout for the write lock)    │
//! │   │     ├── line 1: reserve setting, reserve item                       │
//! │   │     ├── line 2: ...                           (request order)       │
//! │   │     ├── quote(subtotal, region)                                     │
//! │   │     ├── overrides? (ignored unless accepted, then 0..=subtotal)     │
//! │   │     ├── redeem(code)?                                               │
//! │   │     ├── OrderTotals::compute                                        │
//! │   │     ├── insert order + lines                                        │
//! │   │     └── COMMIT ──────────────────────────────► Ok(order)            │
//! │   │                                                                     │
//! │   │   any error ──► ROLLBACK                                            │
//! │   │        │                                                            │
//! │   └── retryable (conflict / busy), attempts left, jittered backoff      │
//! │            │                                                            │
//! │            └── otherwise ────────────────────────► Err(error)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A restarted attempt re-reads everything, so a request that lost a race
//! for the last unit fails with `InsufficientStock` rather than a conflict.

use backoff::backoff::Backoff;
use chrono::{DateTime, Utc};
use lustre_core::validation::{validate_order_request, validate_override};
use lustre_core::{
    CoreError, CoreResult, EntityKind, Money, Order, OrderLineItem, OrderRequest, OrderStatus,
    OrderTotals, PaymentStatus, PriceQuote, PricingPolicy, RegionalPricing, ValidationError,
};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CodeCheck, DiscountRedemptionService, RetryPolicy, StockReservationEngine};
use crate::config::EngineConfig;
use crate::error::DbError;
use crate::pool::Database;
use crate::repository::{self, order};

/// Creates orders atomically and serves order reads and status updates.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    pricing: Arc<dyn PricingPolicy>,
    reservations: StockReservationEngine,
    redemptions: DiscountRedemptionService,
    retry: RetryPolicy,
    accept_price_overrides: bool,
}

impl OrderService {
    /// Creates a service with the launch pricing table and default retries.
    pub fn new(db: Database) -> Self {
        let retry = RetryPolicy::default();
        OrderService {
            db,
            pricing: Arc::new(RegionalPricing::default()),
            reservations: StockReservationEngine::new(retry),
            redemptions: DiscountRedemptionService::new(retry),
            retry,
            accept_price_overrides: false,
        }
    }

    /// Creates a service from engine configuration.
    pub fn from_config(db: Database, config: &EngineConfig, pricing: RegionalPricing) -> Self {
        OrderService::new(db)
            .with_pricing(pricing)
            .with_retry(config.retry)
            .accept_price_overrides(config.accept_price_overrides)
    }

    /// Replaces the pricing policy.
    pub fn with_pricing(mut self, pricing: impl PricingPolicy + 'static) -> Self {
        self.pricing = Arc::new(pricing);
        self
    }

    /// Replaces the retry policy for every stage.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.reservations = StockReservationEngine::new(retry);
        self.redemptions = DiscountRedemptionService::new(retry);
        self
    }

    /// Whether caller-supplied tax / shipping amounts replace computed ones.
    pub fn accept_price_overrides(mut self, accept: bool) -> Self {
        self.accept_price_overrides = accept;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Order Creation
    // =========================================================================

    /// Creates an order, timestamped now.
    pub async fn create_order(&self, request: &OrderRequest) -> CoreResult<Order> {
        self.create_order_at(request, Utc::now()).await
    }

    /// Creates an order as of `now` (expiry checks and timestamps).
    ///
    /// ## Errors
    /// * `EmptyOrder` / `Validation` - Rejected before any storage access
    /// * `EntityNotFound` / `InsufficientStock` - A line could not be reserved
    /// * Any discount-code error - The code was supplied but not redeemable
    /// * `ConcurrencyConflict` - Still contended after every attempt
    /// * `StorageFailure` - The store failed; nothing was persisted
    pub async fn create_order_at(
        &self,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<Order> {
        validate_order_request(request)?;

        info!(
            customer_id = %request.customer_id,
            lines = request.items.len(),
            discount_code = ?request.discount_code,
            "Creating order"
        );

        let mut backoff = self.retry.backoff();

        for attempt in 1..=self.retry.max_attempts {
            match self.try_create_order(request, now).await {
                Ok(order) => {
                    info!(
                        order_id = %order.id,
                        customer_id = %order.customer_id,
                        final_total_cents = order.final_total_cents,
                        attempt,
                        "Order created"
                    );
                    return Ok(order);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = backoff.next_backoff().unwrap_or(self.retry.max_backoff);
                    warn!(
                        customer_id = %request.customer_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Order transaction conflicted, restarting"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(customer_id = %request.customer_id, attempt, error = %e, "Order rejected");
                    return Err(if e.is_retryable() {
                        CoreError::conflict("order", self.retry.max_attempts)
                    } else {
                        e
                    });
                }
            }
        }

        Err(CoreError::conflict("order", self.retry.max_attempts))
    }

    /// One attempt: a single transaction, committed or rolled back.
    async fn try_create_order(
        &self,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<Order> {
        // Write lock up front: a deferred read snapshot goes stale on any
        // concurrent commit and the upgrade fails with BUSY_SNAPSHOT.
        let mut tx = self
            .db
            .pool()
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(DbError::from)?;

        match self.build_order(&mut tx, request, now).await {
            Ok(order) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed; connection drop will discard the transaction");
                }
                Err(e)
            }
        }
    }

    /// Runs every order step on the transaction connection.
    async fn build_order(
        &self,
        conn: &mut SqliteConnection,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<Order> {
        let mut items = Vec::with_capacity(request.items.len());
        let mut subtotal = Money::zero();

        for line in &request.items {
            let mut unit = Money::zero();

            let setting_snapshot = match &line.setting_id {
                Some(id) => {
                    let snapshot = self
                        .reservations
                        .reserve(&mut *conn, EntityKind::Setting, id, line.quantity, now)
                        .await?;
                    unit = add_cents(unit, snapshot.price(), "unit_price")?;
                    snapshot.into_setting()
                }
                None => None,
            };

            let item_snapshot = match &line.item_id {
                Some(id) => {
                    let snapshot = self
                        .reservations
                        .reserve(&mut *conn, EntityKind::Item, id, line.quantity, now)
                        .await?;
                    unit = add_cents(unit, snapshot.price(), "unit_price")?;
                    snapshot.into_item()
                }
                None => None,
            };

            let line_total = unit
                .checked_mul(line.quantity)
                .ok_or_else(|| amount_out_of_range("line_total"))?;
            subtotal = add_cents(subtotal, line_total, "subtotal")?;

            items.push(OrderLineItem {
                id: repository::generate_id(),
                setting_id: line.setting_id.clone(),
                setting_snapshot,
                item_id: line.item_id.clone(),
                item_snapshot,
                quantity: line.quantity,
                unit_price_cents: unit.cents(),
                line_total_cents: line_total.cents(),
                size: line.size.clone(),
                metal: line.metal.clone(),
                engraving: line.engraving.clone(),
            });
        }

        let region = request.shipping_address.region.as_deref();
        let quote = self.apply_overrides(request, subtotal, self.pricing.quote(subtotal, region))?;

        let redemption = match &request.discount_code {
            Some(code) => Some(
                self.redemptions
                    .redeem(&mut *conn, code, subtotal, &request.customer_id, now)
                    .await?,
            ),
            None => None,
        };

        let discount = redemption
            .as_ref()
            .map(|r| r.discount)
            .unwrap_or_else(Money::zero);
        let totals = OrderTotals::compute(subtotal, quote, discount);

        debug!(
            subtotal_cents = totals.subtotal.cents(),
            tax_cents = totals.tax.cents(),
            shipping_cents = totals.shipping.cents(),
            discount_cents = totals.discount.cents(),
            "Computed order totals"
        );

        let order = Order {
            id: repository::generate_id(),
            customer_id: request.customer_id.clone(),
            items,
            shipping_address: request.shipping_address.clone(),
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            shipping_cents: totals.shipping.cents(),
            discount_cents: totals.discount.cents(),
            total_before_discount_cents: totals.total_before_discount.cents(),
            final_total_cents: totals.final_total.cents(),
            discount_code_id: redemption.map(|r| r.code_id),
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        order::insert(&mut *conn, &order).await?;

        Ok(order)
    }

    /// Server-computed amounts win unless overrides are explicitly accepted.
    fn apply_overrides(
        &self,
        request: &OrderRequest,
        subtotal: Money,
        computed: PriceQuote,
    ) -> CoreResult<PriceQuote> {
        let (tax, shipping) = (request.tax_override_cents, request.shipping_override_cents);
        if tax.is_none() && shipping.is_none() {
            return Ok(computed);
        }

        if !self.accept_price_overrides {
            warn!(
                customer_id = %request.customer_id,
                tax_override_cents = ?tax,
                shipping_override_cents = ?shipping,
                "Ignoring client-supplied price overrides"
            );
            return Ok(computed);
        }

        let mut quote = computed;
        if let Some(cents) = tax {
            validate_override("tax_override_cents", cents, subtotal.cents())?;
            quote.tax = Money::from_cents(cents);
        }
        if let Some(cents) = shipping {
            validate_override("shipping_override_cents", cents, subtotal.cents())?;
            quote.shipping = Money::from_cents(cents);
        }

        debug!(tax_cents = quote.tax.cents(), shipping_cents = quote.shipping.cents(), "Applied price overrides");
        Ok(quote)
    }

    // =========================================================================
    // Reads and Status
    // =========================================================================

    /// Orders of one customer, newest first.
    pub async fn list_orders_for_customer(&self, customer_id: &str) -> CoreResult<Vec<Order>> {
        Ok(self.db.orders().list_for_customer(customer_id).await?)
    }

    /// Every order, newest first. Callers must check privileges.
    pub async fn list_all_orders(&self) -> CoreResult<Vec<Order>> {
        Ok(self.db.orders().list_all().await?)
    }

    pub async fn get_order(&self, order_id: &str) -> CoreResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))
    }

    /// Updates status and/or payment status; `None` keeps the current value.
    ///
    /// Last write wins. Returns the updated order.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> CoreResult<Order> {
        let updated = self
            .db
            .orders()
            .update_status(order_id, status, payment_status, Utc::now())
            .await?;

        if !updated {
            return Err(CoreError::OrderNotFound(order_id.to_string()));
        }

        info!(order_id = %order_id, ?status, ?payment_status, "Order status updated");
        self.get_order(order_id).await
    }

    // =========================================================================
    // Discount Codes
    // =========================================================================

    /// Whether `code` would be accepted for an order of `subtotal`, and for
    /// how much. Read-only: the code's usage is not touched.
    pub async fn check_discount_code(
        &self,
        code: &str,
        subtotal: Money,
        customer_id: Option<&str>,
    ) -> CoreResult<CodeCheck> {
        self.check_discount_code_at(code, subtotal, customer_id, Utc::now())
            .await
    }

    /// [`check_discount_code`](Self::check_discount_code) as of `now`.
    pub async fn check_discount_code_at(
        &self,
        code: &str,
        subtotal: Money,
        customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<CodeCheck> {
        if code.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "code".to_string(),
            }
            .into());
        }
        if subtotal < Money::zero() {
            return Err(amount_out_of_range("subtotal"));
        }

        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        self.redemptions
            .check(&mut conn, code, subtotal, customer_id, now)
            .await
    }
}

/// Amounts outside `0..=i64::MAX` are invalid input, never wrapped.
fn add_cents(a: Money, b: Money, field: &str) -> CoreResult<Money> {
    a.checked_add(b).ok_or_else(|| amount_out_of_range(field))
}

fn amount_out_of_range(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::service::test_support::{at, code, item, memory_db, setting};
    use lustre_core::{ErrorKind, LineItemRequest, ShippingAddress};
    use std::time::Duration;

    fn request(customer: &str, lines: Vec<LineItemRequest>, region: &str) -> OrderRequest {
        OrderRequest {
            customer_id: customer.to_string(),
            items: lines,
            shipping_address: ShippingAddress {
                region: Some(region.to_string()),
                ..ShippingAddress::default()
            },
            ..OrderRequest::default()
        }
    }

    fn setting_line(id: &str, quantity: i64) -> LineItemRequest {
        LineItemRequest {
            setting_id: Some(id.to_string()),
            quantity,
            ..LineItemRequest::default()
        }
    }

    async fn stock_of_setting(db: &Database, id: &str) -> i64 {
        db.settings().get_by_id(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_single_setting_order_usa() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        let service = OrderService::new(db.clone());

        let order = service
            .create_order(&request("cust-1", vec![setting_line("s-1", 2)], "USA"))
            .await
            .unwrap();

        assert_eq!(order.subtotal_cents, 20_000);
        assert_eq!(order.tax_cents, 1_400);
        assert_eq!(order.shipping_cents, 1_000);
        assert_eq!(order.discount_cents, 0);
        assert_eq!(order.final_total_cents, 22_400);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(stock_of_setting(&db, "s-1").await, 3);

        let stored = service.get_order(&order.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].unit_price(), Money::from_major(100));
        assert_eq!(
            stored.items[0].setting_snapshot.as_ref().map(|s| s.title.as_str()),
            Some("Setting s-1")
        );
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_order() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 1)).await.unwrap();
        let service = OrderService::new(db.clone());

        let err = service
            .create_order(&request("cust-1", vec![setting_line("s-1", 2)], "USA"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(err.status_code(), 400);
        assert_eq!(stock_of_setting(&db, "s-1").await, 1);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_percentage_and_capped_fixed_discounts() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 10)).await.unwrap();
        db.discount_codes().insert(&code("TENOFF", "percentage", 1_000)).await.unwrap();
        db.discount_codes().insert(&code("HUGE", "fixed", 50_000)).await.unwrap();
        let service = OrderService::new(db.clone());

        let mut percent = request("cust-1", vec![setting_line("s-1", 2)], "USA");
        percent.discount_code = Some("tenoff".to_string());
        let order = service.create_order(&percent).await.unwrap();
        assert_eq!(order.discount_cents, 2_000);
        assert_eq!(order.final_total_cents, 20_400);
        assert_eq!(order.discount_code_id.as_deref(), Some("code-tenoff"));

        let mut fixed = request("cust-2", vec![setting_line("s-1", 2)], "USA");
        fixed.discount_code = Some("HUGE".to_string());
        let order = service.create_order(&fixed).await.unwrap();
        assert_eq!(order.discount_cents, 20_000);
        // tax and shipping still owed
        assert_eq!(order.final_total_cents, 2_400);
        assert_eq!(
            order.final_total_cents,
            order.subtotal_cents - order.discount_cents + order.tax_cents + order.shipping_cents
        );
    }

    #[tokio::test]
    async fn test_exhausted_code_leaves_no_trace() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        let mut exhausted = code("ONCE", "fixed", 1_000);
        exhausted.global_limit = 1;
        exhausted.used_count = 1;
        db.discount_codes().insert(&exhausted).await.unwrap();
        let service = OrderService::new(db.clone());

        let mut req = request("cust-1", vec![setting_line("s-1", 1)], "UK");
        req.discount_code = Some("ONCE".to_string());
        let err = service.create_order(&req).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GlobalLimitReached);
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(stock_of_setting(&db, "s-1").await, 5);
        let after = db.discount_codes().get_by_code("ONCE").await.unwrap().unwrap();
        assert_eq!(after.used_count, 1);
    }

    #[tokio::test]
    async fn test_failed_discount_rolls_back_reservations_and_usage() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        db.items().insert(&item("d-1", 250_000, 1)).await.unwrap();
        let service = OrderService::new(db.clone());

        let mut req = request(
            "cust-1",
            vec![LineItemRequest {
                setting_id: Some("s-1".to_string()),
                item_id: Some("d-1".to_string()),
                quantity: 1,
                ..LineItemRequest::default()
            }],
            "India",
        );
        req.discount_code = Some("MISSING".to_string());

        let err = service.create_order(&req).await.unwrap_err();
        assert!(matches!(err, CoreError::CodeNotFound(_)));
        assert_eq!(stock_of_setting(&db, "s-1").await, 5);
        assert_eq!(db.items().get_by_id("d-1").await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_later_line_failure_releases_earlier_lines() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        db.settings().insert(&setting("s-2", 20_000, 0)).await.unwrap();
        let service = OrderService::new(db.clone());

        let err = service
            .create_order(&request(
                "cust-1",
                vec![setting_line("s-1", 3), setting_line("s-2", 1)],
                "USA",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientStock { ref id, .. } if id == "s-2"));
        assert_eq!(stock_of_setting(&db, "s-1").await, 5);
    }

    #[tokio::test]
    async fn test_unknown_entity_is_not_found() {
        let db = memory_db().await;
        let service = OrderService::new(db);

        let err = service
            .create_order(&request("cust-1", vec![setting_line("ghost", 1)], "USA"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_setting_and_item_line_prices_add_up() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 150_000, 5)).await.unwrap();
        db.items().insert(&item("d-1", 900_000, 1)).await.unwrap();
        let service = OrderService::new(db.clone());

        let order = service
            .create_order(&request(
                "cust-1",
                vec![LineItemRequest {
                    setting_id: Some("s-1".to_string()),
                    item_id: Some("d-1".to_string()),
                    quantity: 1,
                    engraving: Some("Always".to_string()),
                    ..LineItemRequest::default()
                }],
                "USA",
            ))
            .await
            .unwrap();

        assert_eq!(order.subtotal_cents, 1_050_000);
        // at or above 10,000.00 ships free
        assert_eq!(order.shipping_cents, 0);
        assert_eq!(order.items[0].engraving.as_deref(), Some("Always"));
        assert!(order.items[0].item_snapshot.is_some());
        assert_eq!(db.items().get_by_id("d-1").await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_validation_precedes_storage() {
        let db = memory_db().await;
        let service = OrderService::new(db);

        let err = service.create_order(&request("cust-1", vec![], "USA")).await.unwrap_err();
        assert!(matches!(err, CoreError::EmptyOrder));

        let err = service
            .create_order(&request("cust-1", vec![setting_line("s-1", 0)], "USA"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_price_overrides_ignored_by_default() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        let service = OrderService::new(db);

        let mut req = request("cust-1", vec![setting_line("s-1", 2)], "USA");
        req.tax_override_cents = Some(0);
        req.shipping_override_cents = Some(0);
        let order = service.create_order(&req).await.unwrap();

        assert_eq!(order.tax_cents, 1_400);
        assert_eq!(order.shipping_cents, 1_000);
    }

    #[tokio::test]
    async fn test_price_overrides_when_accepted() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        let service = OrderService::new(db.clone()).accept_price_overrides(true);

        let mut req = request("cust-1", vec![setting_line("s-1", 2)], "USA");
        req.tax_override_cents = Some(500);
        let order = service.create_order(&req).await.unwrap();
        assert_eq!(order.tax_cents, 500);
        assert_eq!(order.shipping_cents, 1_000);

        req.shipping_override_cents = Some(20_001);
        let err = service.create_order(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        // the rejected attempt reserved nothing
        assert_eq!(stock_of_setting(&db, "s-1").await, 3);
    }

    #[tokio::test]
    async fn test_per_customer_limit() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 10)).await.unwrap();
        let mut welcome = code("WELCOME", "percentage", 500);
        welcome.per_customer_limit = 1;
        db.discount_codes().insert(&welcome).await.unwrap();
        let service = OrderService::new(db.clone());

        let mut req = request("cust-1", vec![setting_line("s-1", 1)], "USA");
        req.discount_code = Some("WELCOME".to_string());
        service.create_order(&req).await.unwrap();

        let err = service.create_order(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PerCustomerLimitReached);

        // another customer may still use it
        req.customer_id = "cust-2".to_string();
        service.create_order(&req).await.unwrap();

        let after = db.discount_codes().get_by_code("WELCOME").await.unwrap().unwrap();
        assert_eq!(after.used_count, 2);
    }

    #[tokio::test]
    async fn test_expiry_uses_request_clock() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 10)).await.unwrap();
        let mut seasonal = code("SUMMER", "fixed", 1_000);
        seasonal.expires_at = Some(at("2026-09-01T00:00:00Z"));
        db.discount_codes().insert(&seasonal).await.unwrap();
        let service = OrderService::new(db);

        let mut req = request("cust-1", vec![setting_line("s-1", 1)], "USA");
        req.discount_code = Some("SUMMER".to_string());

        let order = service
            .create_order_at(&req, at("2026-08-01T12:00:00Z"))
            .await
            .unwrap();
        assert_eq!(order.discount_cents, 1_000);
        assert_eq!(order.created_at, at("2026-08-01T12:00:00Z"));

        let err = service
            .create_order_at(&req, at("2026-09-01T00:00:00Z"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CodeExpired);
    }

    #[tokio::test]
    async fn test_order_listing_and_status() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 10)).await.unwrap();
        let service = OrderService::new(db);

        let req = request("cust-1", vec![setting_line("s-1", 1)], "USA");
        let first = service.create_order_at(&req, at("2026-05-01T00:00:00Z")).await.unwrap();
        let second = service.create_order_at(&req, at("2026-05-02T00:00:00Z")).await.unwrap();
        service
            .create_order(&request("cust-2", vec![setting_line("s-1", 1)], "UK"))
            .await
            .unwrap();

        let mine = service.list_orders_for_customer("cust-1").await.unwrap();
        assert_eq!(
            mine.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );
        assert_eq!(service.list_all_orders().await.unwrap().len(), 3);

        let shipped = service
            .update_order_status(&first.id, Some(OrderStatus::Shipped), None)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(shipped.payment_status, PaymentStatus::Pending);
        assert_eq!(shipped.final_total_cents, first.final_total_cents);

        let paid = service
            .update_order_status(&first.id, None, Some(PaymentStatus::Paid))
            .await
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Shipped);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let err = service
            .update_order_status("missing", Some(OrderStatus::Cancelled), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OrderNotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_orders_for_last_unit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("race.db")).max_connections(4))
            .await
            .unwrap();
        db.settings().insert(&setting("s-1", 10_000, 1)).await.unwrap();

        let service = OrderService::new(db.clone())
            .with_retry(RetryPolicy::new(10, Duration::from_millis(5)));

        let handles: Vec<_> = ["cust-a", "cust-b"]
            .into_iter()
            .map(|customer| {
                let service = service.clone();
                let req = request(customer, vec![setting_line("s-1", 1)], "USA");
                tokio::spawn(async move { service.create_order(&req).await })
            })
            .collect();

        let mut successes = 0;
        let mut failures = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => failures.push(e),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), ErrorKind::InsufficientStock);
        assert_eq!(stock_of_setting(&db, "s-1").await, 0);
        assert_eq!(db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_respect_global_limit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("codes.db")).max_connections(4))
            .await
            .unwrap();
        db.settings().insert(&setting("s-1", 10_000, 20)).await.unwrap();
        let mut limited = code("FIRST3", "fixed", 1_000);
        limited.global_limit = 3;
        db.discount_codes().insert(&limited).await.unwrap();

        let service = OrderService::new(db.clone())
            .with_retry(RetryPolicy::new(20, Duration::from_millis(5)));

        let handles: Vec<_> = (0..6)
            .map(|n| {
                let service = service.clone();
                let mut req = request(&format!("cust-{n}"), vec![setting_line("s-1", 1)], "USA");
                req.discount_code = Some("FIRST3".to_string());
                tokio::spawn(async move { service.create_order(&req).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::GlobalLimitReached, "unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 3);
        let after = db.discount_codes().get_by_code("FIRST3").await.unwrap().unwrap();
        assert_eq!(after.used_count, 3);
        assert_eq!(stock_of_setting(&db, "s-1").await, 17);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_with_ample_stock_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("busy.db")).max_connections(8))
            .await
            .unwrap();
        db.settings().insert(&setting("s-1", 10_000, 1_000)).await.unwrap();

        let service = OrderService::new(db.clone());

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let service = service.clone();
                let req = request(&format!("cust-{n}"), vec![setting_line("s-1", 1)], "USA");
                tokio::spawn(async move { service.create_order(&req).await })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(outcome.is_ok(), "order failed: {:?}", outcome.err());
        }

        assert_eq!(stock_of_setting(&db, "s-1").await, 984);
        assert_eq!(db.orders().count().await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_overflowing_amounts_are_rejected() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        // a row written before the price ceiling existed
        sqlx::query("UPDATE settings SET price_cents = ?1 WHERE id = 's-1'")
            .bind(i64::MAX / 2)
            .execute(db.pool())
            .await
            .unwrap();
        let service = OrderService::new(db.clone());

        let err = service
            .create_order(&request("cust-1", vec![setting_line("s-1", 3)], "USA"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(stock_of_setting(&db, "s-1").await, 5);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_failure_after_redemption_restores_usage() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        db.discount_codes().insert(&code("TENOFF", "percentage", 1_000)).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER freeze_orders BEFORE INSERT ON orders \
             BEGIN SELECT RAISE(ABORT, 'orders are frozen'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();
        let service = OrderService::new(db.clone());

        let mut req = request("cust-1", vec![setting_line("s-1", 2)], "USA");
        req.discount_code = Some("TENOFF".to_string());
        let err = service.create_order(&req).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(stock_of_setting(&db, "s-1").await, 5);
        let after = db.discount_codes().get_by_code("TENOFF").await.unwrap().unwrap();
        assert_eq!(after.used_count, 0);
        assert_eq!(after.version, 0);
    }

    #[tokio::test]
    async fn test_cancelled_order_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("cancel.db")).max_connections(2))
            .await
            .unwrap();
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        db.discount_codes().insert(&code("TENOFF", "percentage", 1_000)).await.unwrap();

        // the order insert runs last and is made slow enough to cancel
        sqlx::query("CREATE TABLE pad (n INTEGER NOT NULL)")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "WITH RECURSIVE c(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM c WHERE n < 6000) \
             INSERT INTO pad (n) SELECT n FROM c",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "CREATE TRIGGER slow_orders AFTER INSERT ON orders \
             BEGIN SELECT count(*) FROM pad a, pad b; END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let service = OrderService::new(db.clone());
        let mut req = request("cust-1", vec![setting_line("s-1", 2)], "USA");
        req.discount_code = Some("TENOFF".to_string());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), service.create_order(&req)).await;
        assert!(cancelled.is_err());

        // waits for the abandoned transaction to release the write lock
        sqlx::query("DROP TRIGGER slow_orders")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(stock_of_setting(&db, "s-1").await, 5);
        let code_row = db.discount_codes().get_by_code("TENOFF").await.unwrap().unwrap();
        assert_eq!(code_row.used_count, 0);
        assert_eq!(db.orders().count().await.unwrap(), 0);

        // the engine is usable again
        service.create_order(&req).await.unwrap();
        assert_eq!(stock_of_setting(&db, "s-1").await, 3);
    }

    #[tokio::test]
    async fn test_check_discount_code_is_read_only() {
        let db = memory_db().await;
        db.settings().insert(&setting("s-1", 10_000, 5)).await.unwrap();
        let mut once = code("ONEPER", "percentage", 1_000);
        once.per_customer_limit = 1;
        db.discount_codes().insert(&once).await.unwrap();
        let service = OrderService::new(db.clone());

        let check = service
            .check_discount_code(" oneper ", Money::from_major(200), Some("cust-1"))
            .await
            .unwrap();
        assert_eq!(check.code, "ONEPER");
        assert_eq!(check.discount_cents, 2_000);
        assert_eq!(check.remaining_uses, None);

        let mut req = request("cust-1", vec![setting_line("s-1", 1)], "USA");
        req.discount_code = Some("ONEPER".to_string());
        service.create_order(&req).await.unwrap();

        let err = service
            .check_discount_code("ONEPER", Money::from_major(200), Some("cust-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PerCustomerLimitReached);
        // without a customer only the code itself is checked
        service
            .check_discount_code("ONEPER", Money::from_major(200), None)
            .await
            .unwrap();

        let after = db.discount_codes().get_by_code("ONEPER").await.unwrap().unwrap();
        assert_eq!(after.used_count, 1);
    }

    #[tokio::test]
    async fn test_check_discount_code_validates_input() {
        let service = OrderService::new(memory_db().await);

        let err = service
            .check_discount_code("  ", Money::from_major(10), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .check_discount_code("ANY", Money::from_cents(-1), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
