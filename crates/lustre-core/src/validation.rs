//! # Validation Module
//!
//! Input validation for order requests and catalog / discount records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                       │
//! │  ├── Shape and types of the JSON request                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Request rules checked before a transaction is opened               │
//! │  └── Creation rules for discount codes and catalog entities             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (stock >= 0), UNIQUE (code), FOREIGN KEY constraints         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::discount::DiscountKind;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::BPS_SCALE;
use crate::types::{DiscountCode, LineItemRequest, OrderRequest};
use crate::{MAX_CUSTOMIZATION_LEN, MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Order Requests
// =============================================================================

/// Validates an order request before any storage access.
///
/// `EmptyOrder` is reported ahead of every other problem.
pub fn validate_order_request(request: &OrderRequest) -> CoreResult<()> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyOrder);
    }

    validate_customer_id(&request.customer_id)?;

    if request.items.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        }
        .into());
    }

    for line in &request.items {
        validate_line_item(line)?;
    }

    if let Some(code) = &request.discount_code {
        if code.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "discount_code".to_string(),
            }
            .into());
        }
    }

    if let Some(tax) = request.tax_override_cents {
        validate_non_negative("tax_override_cents", tax)?;
    }
    if let Some(shipping) = request.shipping_override_cents {
        validate_non_negative("shipping_override_cents", shipping)?;
    }

    Ok(())
}

/// Validates the customer id.
pub fn validate_customer_id(customer_id: &str) -> ValidationResult<()> {
    if customer_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "customer_id".to_string(),
        });
    }
    Ok(())
}

/// Validates one requested line.
///
/// A line may reference a setting, an item, both, or neither; referenced
/// ids must not be blank.
pub fn validate_line_item(line: &LineItemRequest) -> ValidationResult<()> {
    validate_quantity(line.quantity)?;

    for (field, id) in [("setting_id", &line.setting_id), ("item_id", &line.item_id)] {
        if id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
    }

    for (field, value) in [
        ("size", &line.size),
        ("metal", &line.metal),
        ("engraving", &line.engraving),
    ] {
        if value
            .as_deref()
            .is_some_and(|v| v.chars().count() > MAX_CUSTOMIZATION_LEN)
        {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_CUSTOMIZATION_LEN,
            });
        }
    }

    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents: `0..=MAX_PRICE_CENTS`.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    validate_non_negative("stock", stock)
}

fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates an advisory price override against the order subtotal.
pub fn validate_override(field: &str, value: i64, subtotal_cents: i64) -> ValidationResult<()> {
    if value < 0 || value > subtotal_cents {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: subtotal_cents,
        });
    }
    Ok(())
}

// =============================================================================
// Discount Codes
// =============================================================================

/// Validates a discount code at creation time.
///
/// ## Rules
/// - code: 3–32 chars, letters / digits / `-` / `_`, already normalized
/// - kind: `percentage` or `fixed`
/// - value ≥ 0, and percentage ≤ 10000 bps (100%)
/// - limits ≥ 0, used_count starts within the global limit
pub fn validate_new_discount_code(code: &DiscountCode) -> ValidationResult<()> {
    let len = code.code.chars().count();
    if len < 3 || len > 32 {
        return Err(ValidationError::OutOfRange {
            field: "code length".to_string(),
            min: 3,
            max: 32,
        });
    }

    if !code
        .code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must be upper-case letters, digits, hyphens or underscores".to_string(),
        });
    }

    let kind = DiscountKind::parse(&code.kind).ok_or_else(|| ValidationError::NotAllowed {
        field: "kind".to_string(),
        allowed: vec![
            DiscountKind::Percentage.as_str().to_string(),
            DiscountKind::Fixed.as_str().to_string(),
        ],
    })?;

    validate_non_negative("value", code.value)?;
    if kind == DiscountKind::Percentage && code.value > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "value".to_string(),
            min: 0,
            max: BPS_SCALE,
        });
    }

    validate_non_negative("global_limit", code.global_limit)?;
    validate_non_negative("per_customer_limit", code.per_customer_limit)?;
    validate_non_negative("used_count", code.used_count)?;
    if code.global_limit > 0 && code.used_count > code.global_limit {
        return Err(ValidationError::OutOfRange {
            field: "used_count".to_string(),
            min: 0,
            max: code.global_limit,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
