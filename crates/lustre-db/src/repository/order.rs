//! # Order Repository
//!
//! Database operations for orders and order lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE (inside the order transaction only)                          │
//! │     └── insert() → orders row + one order_items row per line            │
//! │         (snapshots stored by value as JSON)                             │
//! │                                                                         │
//! │  2. READ                                                                │
//! │     └── get_by_id / list_for_customer / list_all (newest first)         │
//! │                                                                         │
//! │  3. STATUS                                                              │
//! │     └── update_status() → status / payment_status, last write wins      │
//! │                                                                         │
//! │  Totals, lines and snapshots never change after step 1.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use lustre_core::{
    ItemSnapshot, Order, OrderLineItem, OrderStatus, PaymentStatus, SettingSnapshot,
    ShippingAddress,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{from_json, to_json};
use crate::error::DbResult;

const SELECT_ORDER: &str = r#"
    SELECT
        id, customer_id, shipping_address,
        subtotal_cents, tax_cents, shipping_cents, discount_cents,
        total_before_discount_cents, final_total_cents,
        discount_code_id, status, payment_status, created_at, updated_at
    FROM orders
"#;

/// Raw `orders` row; lines are loaded separately.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    customer_id: String,
    shipping_address: String,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    discount_cents: i64,
    total_before_discount_cents: i64,
    final_total_cents: i64,
    discount_code_id: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLineItem>) -> DbResult<Order> {
        let shipping_address: ShippingAddress =
            from_json("orders.shipping_address", &self.shipping_address)?;

        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            items,
            shipping_address,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            shipping_cents: self.shipping_cents,
            discount_cents: self.discount_cents,
            total_before_discount_cents: self.total_before_discount_cents,
            final_total_cents: self.final_total_cents,
            discount_code_id: self.discount_code_id,
            status: self.status,
            payment_status: self.payment_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw `order_items` row.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: String,
    setting_id: Option<String>,
    setting_snapshot: Option<String>,
    item_id: Option<String>,
    item_snapshot: Option<String>,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
    size: Option<String>,
    metal: Option<String>,
    engraving: Option<String>,
}

impl OrderItemRow {
    fn into_line(self) -> DbResult<OrderLineItem> {
        let setting_snapshot: Option<SettingSnapshot> = self
            .setting_snapshot
            .as_deref()
            .map(|raw| from_json("order_items.setting_snapshot", raw))
            .transpose()?;
        let item_snapshot: Option<ItemSnapshot> = self
            .item_snapshot
            .as_deref()
            .map(|raw| from_json("order_items.item_snapshot", raw))
            .transpose()?;

        Ok(OrderLineItem {
            id: self.id,
            setting_id: self.setting_id,
            setting_snapshot,
            item_id: self.item_id,
            item_snapshot,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            line_total_cents: self.line_total_cents,
            size: self.size,
            metal: self.metal,
            engraving: self.engraving,
        })
    }
}

// =============================================================================
// Connection-level
// =============================================================================

/// Inserts an order and all of its lines on the given connection.
///
/// Meant to run inside the order transaction; the header and lines become
/// visible together on commit.
pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(
        id = %order.id,
        customer_id = %order.customer_id,
        lines = order.items.len(),
        final_total_cents = order.final_total_cents,
        "Inserting order"
    );

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_id, shipping_address,
            subtotal_cents, tax_cents, shipping_cents, discount_cents,
            total_before_discount_cents, final_total_cents,
            discount_code_id, status, payment_status, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3,
            ?4, ?5, ?6, ?7,
            ?8, ?9,
            ?10, ?11, ?12, ?13, ?14
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(to_json("orders.shipping_address", &order.shipping_address)?)
    .bind(order.subtotal_cents)
    .bind(order.tax_cents)
    .bind(order.shipping_cents)
    .bind(order.discount_cents)
    .bind(order.total_before_discount_cents)
    .bind(order.final_total_cents)
    .bind(&order.discount_code_id)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, line) in order.items.iter().enumerate() {
        let setting_snapshot = line
            .setting_snapshot
            .as_ref()
            .map(|s| to_json("order_items.setting_snapshot", s))
            .transpose()?;
        let item_snapshot = line
            .item_snapshot
            .as_ref()
            .map(|i| to_json("order_items.item_snapshot", i))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, position,
                setting_id, setting_snapshot, item_id, item_snapshot,
                quantity, unit_price_cents, line_total_cents,
                size, metal, engraving
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13
            )
            "#,
        )
        .bind(&line.id)
        .bind(&order.id)
        .bind(position as i64)
        .bind(&line.setting_id)
        .bind(setting_snapshot)
        .bind(&line.item_id)
        .bind(item_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .bind(&line.size)
        .bind(&line.metal)
        .bind(&line.engraving)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Loads the lines of one order, in request order.
pub async fn find_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLineItem>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT
            id, setting_id, setting_snapshot, item_id, item_snapshot,
            quantity, unit_price_cents, line_total_cents, size, metal, engraving
        FROM order_items
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(OrderItemRow::into_line).collect()
}

/// Gets an order with its lines.
pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("{SELECT_ORDER} WHERE id = ?1");

    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let items = find_lines(&mut *conn, &row.id).await?;
            Ok(Some(row.into_order(items)?))
        }
        None => Ok(None),
    }
}

/// Attaches lines to a batch of order rows.
async fn hydrate(conn: &mut SqliteConnection, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = find_lines(&mut *conn, &row.id).await?;
        orders.push(row.into_order(items)?);
    }
    Ok(orders)
}

// =============================================================================
// Pool-level
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    /// Orders of one customer, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Order>> {
        debug!(customer_id = %customer_id, "Listing customer orders");

        let mut conn = self.pool.acquire().await?;
        let sql = format!("{SELECT_ORDER} WHERE customer_id = ?1 ORDER BY created_at DESC, rowid DESC");

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(customer_id)
            .fetch_all(&mut *conn)
            .await?;

        hydrate(&mut conn, rows).await
    }

    /// Every order, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{SELECT_ORDER} ORDER BY created_at DESC, rowid DESC");

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;

        hydrate(&mut conn, rows).await
    }

    /// Sets status and/or payment status; `None` keeps the current value.
    ///
    /// ## Returns
    /// * `Ok(true)` - Updated
    /// * `Ok(false)` - No such order
    pub async fn update_status(
        &self,
        id: &str,
        status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, ?status, ?payment_status, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET
                status = COALESCE(?1, status),
                payment_status = COALESCE(?2, payment_status),
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(status)
        .bind(payment_status)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
