//! # Pricing Calculator
//!
//! Turns an order subtotal and a shipping region into a tax amount and a
//! shipping fee.
//!
//! ## Contract
//! ```text
//! quote(subtotal, region?) ──► PriceQuote { tax, shipping }
//!
//!   • deterministic, no I/O, never fails
//!   • unknown / missing region  → default rate and fee
//!   • subtotal ≥ free threshold → shipping = 0 (any region)
//!   • rounding: half away from zero, to the cent
//! ```
//!
//! The coordinator only sees the [`PricingPolicy`] trait, so a different rate
//! table (or an entirely different calculator) can be swapped in without
//! touching the order transaction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::money::Money;

// =============================================================================
// Quote
// =============================================================================

/// Tax and shipping for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub tax: Money,
    pub shipping: Money,
}

/// Anything that can price an order.
pub trait PricingPolicy: Send + Sync + std::fmt::Debug {
    /// Computes tax and shipping for a non-negative subtotal.
    fn quote(&self, subtotal: Money, region: Option<&str>) -> PriceQuote;
}

// =============================================================================
// Regional Pricing
// =============================================================================

/// Tax rate and flat shipping fee for one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRate {
    pub tax_rate_bps: u32,
    pub shipping_cents: i64,
}

impl RegionRate {
    pub const fn new(tax_rate_bps: u32, shipping: Money) -> Self {
        RegionRate {
            tax_rate_bps,
            shipping_cents: shipping.cents(),
        }
    }
}

/// Table-driven [`PricingPolicy`].
///
/// ## JSON Shape
/// ```json
/// {
///   "regions": { "USA": { "taxRateBps": 700, "shippingCents": 1000 } },
///   "fallback": { "taxRateBps": 1000, "shippingCents": 2500 },
///   "freeShippingThresholdCents": 1000000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalPricing {
    #[serde(default)]
    regions: HashMap<String, RegionRate>,
    fallback: RegionRate,
    #[serde(default)]
    free_shipping_threshold_cents: Option<i64>,
}

impl RegionalPricing {
    /// Creates an empty table where every region uses `fallback`.
    pub fn new(fallback: RegionRate) -> Self {
        RegionalPricing {
            regions: HashMap::new(),
            fallback,
            free_shipping_threshold_cents: None,
        }
    }

    /// Adds or replaces one region. Region names are matched case-insensitively.
    pub fn with_region(mut self, region: &str, rate: RegionRate) -> Self {
        self.regions.insert(normalize_region(region), rate);
        self
    }

    /// Sets the subtotal at or above which shipping is free.
    pub fn with_free_shipping_threshold(mut self, threshold: Money) -> Self {
        self.free_shipping_threshold_cents = Some(threshold.cents());
        self
    }

    /// Parses a pricing table from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: RegionalPricing = serde_json::from_str(json)?;
        let regions = parsed
            .regions
            .into_iter()
            .map(|(region, rate)| (normalize_region(&region), rate))
            .collect();
        Ok(RegionalPricing { regions, ..parsed })
    }

    /// Returns the rate used for `region`.
    pub fn rate_for(&self, region: Option<&str>) -> RegionRate {
        region
            .map(normalize_region)
            .and_then(|key| self.regions.get(&key).copied())
            .unwrap_or(self.fallback)
    }

    fn ships_free(&self, subtotal: Money) -> bool {
        self.free_shipping_threshold_cents
            .is_some_and(|threshold| subtotal.cents() >= threshold)
    }
}

impl Default for RegionalPricing {
    /// The launch table.
    ///
    /// | Region | Tax | Shipping |
    /// |--------|-----|----------|
    /// | India  | 18% | 50.00    |
    /// | USA    | 7%  | 10.00    |
    /// | UK     | 20% | 12.00    |
    /// | other  | 10% | 25.00    |
    ///
    /// Orders of 10,000.00 or more ship free.
    fn default() -> Self {
        RegionalPricing::new(RegionRate::new(1_000, Money::from_major(25)))
            .with_region("India", RegionRate::new(1_800, Money::from_major(50)))
            .with_region("USA", RegionRate::new(700, Money::from_major(10)))
            .with_region("UK", RegionRate::new(2_000, Money::from_major(12)))
            .with_free_shipping_threshold(Money::from_major(10_000))
    }
}

impl PricingPolicy for RegionalPricing {
    fn quote(&self, subtotal: Money, region: Option<&str>) -> PriceQuote {
        let rate = self.rate_for(region);
        let tax = subtotal.percent_bps(rate.tax_rate_bps);
        let shipping = if self.ships_free(subtotal) {
            Money::zero()
        } else {
            Money::from_cents(rate.shipping_cents)
        };
        PriceQuote { tax, shipping }
    }
}

fn normalize_region(region: &str) -> String {
    region.trim().to_uppercase()
}

// =============================================================================
// Unit Tests
// =============================================================================
