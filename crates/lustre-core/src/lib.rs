//! # lustre-core: Pure Business Logic for Lustre Orders
//!
//! This crate holds everything about an order that can be decided without
//! touching storage: money arithmetic, the pricing calculator, discount-code
//! rules, order totals and request validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Lustre Orders Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    lustre-cli / HTTP glue                       │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │ OrderRequest                           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │            lustre-db (order transaction + SQLite)               │    │
//! │  │   Reservation Engine ─► Pricing ─► Redemption ─► Order insert   │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │ pure calls                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ lustre-core (THIS CRATE) ★                      │    │
//! │  │                                                                 │    │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐  │    │
//! │  │   │  types  │ │  money  │ │ pricing  │ │ discount │ │validate│  │    │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘  │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog entities, snapshots, orders and requests
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Tax and shipping quotes per region
//! - [`discount`] - Discount-code eligibility and discount computation
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use lustre_core::money::Money;
//! use lustre_core::pricing::{PricingPolicy, RegionalPricing};
//!
//! let pricing = RegionalPricing::default();
//! let quote = pricing.quote(Money::from_cents(20_000), Some("USA"));
//!
//! assert_eq!(quote.tax.cents(), 1_400);      // 7%
//! assert_eq!(quote.shipping.cents(), 1_000); // flat $10
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use pricing::{PriceQuote, PricingPolicy, RegionalPricing};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single order request.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest catalog price in cents (1,000,000,000.00).
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_ORDER_LINES`] a subtotal stays far
/// below `i64::MAX`.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Maximum length of the free-text customization fields (size, metal, engraving).
pub const MAX_CUSTOMIZATION_LEN: usize = 200;
