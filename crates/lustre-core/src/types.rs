//! # Domain Types
//!
//! Core domain types used throughout Lustre Orders.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (mutable stock)          Orders (immutable once created)       │
//! │  ┌─────────────────┐              ┌──────────────────────────────┐      │
//! │  │ SellableSetting │──snapshot──► │ OrderLineItem                │      │
//! │  │ stock, version  │              │  setting_snapshot (by value) │      │
//! │  └─────────────────┘              │  item_snapshot    (by value) │      │
//! │  ┌─────────────────┐              │  quantity, unit_price_cents  │      │
//! │  │ SellableItem    │──snapshot──► └──────────────┬───────────────┘      │
//! │  │ stock, version  │                             │ 1..n                 │
//! │  └─────────────────┘              ┌──────────────▼───────────────┐      │
//! │  ┌─────────────────┐   used by    │ Order                        │      │
//! │  │ DiscountCode    │◄──────────── │  totals, status, payment     │      │
//! │  │ used_count, ver │              └──────────────────────────────┘      │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Order lines embed *copies* of the catalog entity fields at purchase time.
//! Later edits or deletions of a setting or item never change a historical
//! order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::pricing::PriceQuote;

// =============================================================================
// Entity Kind
// =============================================================================

/// The two kinds of sellable catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A configurable mounting ("setting").
    Setting,
    /// An individually serialized piece such as a graded stone.
    Item,
}

impl EntityKind {
    /// Storage table holding this kind of entity.
    pub const fn table(&self) -> &'static str {
        match self {
            EntityKind::Setting => "settings",
            EntityKind::Item => "items",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Setting => f.write_str("setting"),
            EntityKind::Item => f.write_str("item"),
        }
    }
}

// =============================================================================
// Catalog Entities
// =============================================================================

/// A configurable setting (mounting) with its own stock counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellableSetting {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    /// Base price in cents.
    pub price_cents: i64,
    /// e.g. "14K White Gold", "Platinum".
    pub metal_options: Vec<String>,
    /// Stone shapes this setting accepts.
    pub available_shapes: Vec<String>,
    /// e.g. "bezel", "cathedral".
    pub features: Vec<String>,
    pub images: Vec<String>,
    pub stock: i64,
    /// Optimistic-concurrency counter, bumped by every stock write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SellableSetting {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Copies the purchasable attributes into an order snapshot.
    pub fn snapshot(&self) -> SettingSnapshot {
        SettingSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            price_cents: self.price_cents,
            metal_options: self.metal_options.clone(),
            available_shapes: self.available_shapes.clone(),
            features: self.features.clone(),
            images: self.images.clone(),
        }
    }
}

/// An individually serialized item (e.g. a graded stone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SellableItem {
    pub id: String,
    pub sku: String,
    pub shape: Option<String>,
    pub carat: Option<f64>,
    pub cut: Option<String>,
    pub clarity: Option<String>,
    pub color: Option<String>,
    pub lab_grown: bool,
    pub certificate: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SellableItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id.clone(),
            sku: self.sku.clone(),
            shape: self.shape.clone(),
            carat: self.carat,
            cut: self.cut.clone(),
            clarity: self.clarity.clone(),
            color: self.color.clone(),
            lab_grown: self.lab_grown,
            certificate: self.certificate.clone(),
            price_cents: self.price_cents,
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Setting attributes frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSnapshot {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub metal_options: Vec<String>,
    pub available_shapes: Vec<String>,
    pub features: Vec<String>,
    pub images: Vec<String>,
}

/// Item attributes frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: String,
    pub sku: String,
    pub shape: Option<String>,
    pub carat: Option<f64>,
    pub cut: Option<String>,
    pub clarity: Option<String>,
    pub color: Option<String>,
    pub lab_grown: bool,
    pub certificate: Option<String>,
    pub price_cents: i64,
}

/// What the reservation engine hands back for one successful reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntitySnapshot {
    Setting(SettingSnapshot),
    Item(ItemSnapshot),
}

impl EntitySnapshot {
    pub fn price(&self) -> Money {
        match self {
            EntitySnapshot::Setting(s) => Money::from_cents(s.price_cents),
            EntitySnapshot::Item(i) => Money::from_cents(i.price_cents),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySnapshot::Setting(_) => EntityKind::Setting,
            EntitySnapshot::Item(_) => EntityKind::Item,
        }
    }

    pub fn into_setting(self) -> Option<SettingSnapshot> {
        match self {
            EntitySnapshot::Setting(s) => Some(s),
            EntitySnapshot::Item(_) => None,
        }
    }

    pub fn into_item(self) -> Option<ItemSnapshot> {
        match self {
            EntitySnapshot::Item(i) => Some(i),
            EntitySnapshot::Setting(_) => None,
        }
    }
}

// =============================================================================
// Discount Code
// =============================================================================

/// A redeemable discount code.
///
/// ## Value Semantics
/// - `percentage`: `value` is basis points (1000 = 10%), at most 10000
/// - `fixed`: `value` is cents
///
/// `kind` is kept as the stored string; anything other than the two canonical
/// kinds is rejected at redemption with `InvalidCodeKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: String,
    /// Trimmed and upper-cased.
    pub code: String,
    pub kind: String,
    pub value: i64,
    /// 0 = unlimited.
    pub global_limit: i64,
    pub used_count: i64,
    /// 0 = unlimited.
    pub per_customer_limit: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Just created, waiting for fulfillment.
    #[default]
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Where the order ships. `region` drives tax and shipping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    /// Country or region name, e.g. "USA".
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

// =============================================================================
// Order Request
// =============================================================================

/// One requested line: a setting and/or an item plus customization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    #[serde(default)]
    pub setting_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub metal: Option<String>,
    #[serde(default)]
    pub engraving: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

/// A customer's request to create an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub discount_code: Option<String>,
    /// Advisory only; see the coordinator's override policy.
    #[serde(default)]
    pub tax_override_cents: Option<i64>,
    /// Advisory only; see the coordinator's override policy.
    #[serde(default)]
    pub shipping_override_cents: Option<i64>,
}

// =============================================================================
// Order
// =============================================================================

/// A line of a created order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub id: String,
    pub setting_id: Option<String>,
    pub setting_snapshot: Option<SettingSnapshot>,
    pub item_id: Option<String>,
    pub item_snapshot: Option<ItemSnapshot>,
    pub quantity: i64,
    /// Sum of the referenced entity prices at purchase time.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub size: Option<String>,
    pub metal: Option<String>,
    pub engraving: Option<String>,
}

impl OrderLineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// An order as persisted. Immutable except for `status` / `payment_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    /// subtotal + tax + shipping
    pub total_before_discount_cents: i64,
    /// total_before_discount − discount
    pub final_total_cents: i64,
    pub discount_code_id: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the stored totals as an [`OrderTotals`].
    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: Money::from_cents(self.subtotal_cents),
            tax: Money::from_cents(self.tax_cents),
            shipping: Money::from_cents(self.shipping_cents),
            discount: Money::from_cents(self.discount_cents),
            total_before_discount: Money::from_cents(self.total_before_discount_cents),
            final_total: Money::from_cents(self.final_total_cents),
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// The price breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total_before_discount: Money,
    pub final_total: Money,
}

impl OrderTotals {
    /// Assembles the breakdown.
    ///
    /// The discount is clamped into `0..=subtotal`, so
    /// `final_total = subtotal − discount + tax + shipping` never drops below
    /// `tax + shipping`.
    pub fn compute(subtotal: Money, quote: PriceQuote, discount: Money) -> Self {
        let discount = discount.min(subtotal).max(Money::zero());
        let total_before_discount = subtotal + quote.tax + quote.shipping;
        OrderTotals {
            subtotal,
            tax: quote.tax,
            shipping: quote.shipping,
            discount,
            total_before_discount,
            final_total: total_before_discount - discount,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
