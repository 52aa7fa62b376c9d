//! # Discount Rules
//!
//! Pure half of discount redemption: eligibility checks and the discount
//! computation. The storage half (lookup, per-customer count, conditional
//! usage increment) lives in `lustre-db`'s redemption service.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  First failing check wins; later checks are skipped.                    │
//! │                                                                         │
//! │  1. exists                         → CodeNotFound        (storage)      │
//! │  2. active                         → CodeInactive        check_usable   │
//! │  3. expires_at > now               → CodeExpired         check_usable   │
//! │  4. used_count < global_limit      → GlobalLimitReached  check_usable   │
//! │  5. prior uses < per_customer_limit→ PerCustomerLimit... check_customer │
//! │  6. kind ∈ {percentage, fixed}     → InvalidCodeKind     compute        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::DiscountCode;

/// Canonical discount kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is basis points of the subtotal.
    Percentage,
    /// `value` is a flat amount in cents.
    Fixed,
}

impl DiscountKind {
    /// Parses a stored kind. Only the canonical names are accepted.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "percentage" => Some(DiscountKind::Percentage),
            "fixed" => Some(DiscountKind::Fixed),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
        }
    }
}

/// Normalizes a code as typed by a customer: trimmed, upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl DiscountCode {
    /// Checks 2–4: active, not expired, global limit not reached.
    pub fn check_usable(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.active {
            return Err(CoreError::CodeInactive(self.code.clone()));
        }

        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(CoreError::CodeExpired(self.code.clone()));
            }
        }

        if self.global_limit > 0 && self.used_count >= self.global_limit {
            return Err(CoreError::GlobalLimitReached(self.code.clone()));
        }

        Ok(())
    }

    /// Check 5, given how many of this customer's orders already used the code.
    pub fn check_customer_limit(&self, prior_uses: i64) -> CoreResult<()> {
        if self.per_customer_limit > 0 && prior_uses >= self.per_customer_limit {
            return Err(CoreError::PerCustomerLimitReached(self.code.clone()));
        }
        Ok(())
    }

    /// Parsed kind, or `InvalidCodeKind`.
    pub fn discount_kind(&self) -> CoreResult<DiscountKind> {
        DiscountKind::parse(&self.kind).ok_or_else(|| CoreError::InvalidCodeKind {
            code: self.code.clone(),
            kind: self.kind.clone(),
        })
    }

    /// Discount this code grants on `subtotal`, capped at the subtotal.
    ///
    /// ## Example
    /// ```text
    /// subtotal $200.00, percentage 1000 bps → $20.00
    /// subtotal $200.00, fixed 50000 cents   → $200.00 (capped)
    /// ```
    pub fn compute_discount(&self, subtotal: Money) -> CoreResult<Money> {
        let value = self.value.max(0);
        let computed = match self.discount_kind()? {
            DiscountKind::Percentage => {
                subtotal.percent_bps(u32::try_from(value).unwrap_or(u32::MAX))
            }
            DiscountKind::Fixed => Money::from_cents(value),
        };
        Ok(computed.min(subtotal))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
