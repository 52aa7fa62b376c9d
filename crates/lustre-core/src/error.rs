//! # Error Types
//!
//! Domain-specific error types for lustre-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  lustre-core errors (this file)                                         │
//! │  ├── CoreError        - The order-transaction taxonomy                  │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  lustre-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, converted into               │
//! │                         CoreError::StorageFailure / ConcurrencyConflict │
//! │                                                                         │
//! │  CLI errors (in app)                                                    │
//! │  └── ApiError         - What the operator sees (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` carries a machine-readable [`ErrorKind`] and an abstract
//! response status (see [`CoreError::status_code`]).

use serde::Serialize;
use thiserror::Error;

use crate::types::EntityKind;

// =============================================================================
// Core Error
// =============================================================================

/// Failures of the order-commit transaction and its satellite operations.
///
/// Whatever variant is returned, the transaction that produced it has already
/// been rolled back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The request contained no line items.
    #[error("Order must have at least one item")]
    EmptyOrder,

    /// A referenced setting or item does not exist.
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: EntityKind, id: String },

    /// The entity exists but cannot cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Line: setting RING-SOL (qty: 2)
    ///      │
    ///      ▼
    /// Check stock: available=1
    ///      │
    ///      ▼
    /// InsufficientStock { kind: Setting, id: "RING-SOL", available: 1, requested: 2 }
    ///      │
    ///      ▼
    /// Whole order rolled back, nothing decremented
    /// ```
    #[error("Insufficient stock for {kind} {id}: available {available}, requested {requested}")]
    InsufficientStock {
        kind: EntityKind,
        id: String,
        available: i64,
        requested: i64,
    },

    /// No discount code with this (normalized) value exists.
    #[error("Discount code not found: {0}")]
    CodeNotFound(String),

    /// The code exists but has been switched off.
    #[error("Discount code {0} is not active")]
    CodeInactive(String),

    /// The code's expiry is not in the future.
    #[error("Discount code {0} has expired")]
    CodeExpired(String),

    /// `used_count` already reached `global_limit`.
    #[error("Discount code {0} usage limit reached")]
    GlobalLimitReached(String),

    /// This customer already redeemed the code the maximum allowed times.
    #[error("Discount code {0} already used the maximum allowed times by this customer")]
    PerCustomerLimitReached(String),

    /// The stored kind is neither `percentage` nor `fixed`.
    #[error("Discount code {code} has invalid kind '{kind}'")]
    InvalidCodeKind { code: String, kind: String },

    /// Conditional writes kept losing to concurrent requests.
    #[error("Concurrent modification of {resource}, gave up after {attempts} attempts")]
    ConcurrencyConflict { resource: String, attempts: u32 },

    /// Order lookup by id failed.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Transport or transaction-layer fault in the entity store.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a `ConcurrencyConflict` error.
    pub fn conflict(resource: impl Into<String>, attempts: u32) -> Self {
        CoreError::ConcurrencyConflict {
            resource: resource.into(),
            attempts,
        }
    }

    /// Machine-readable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EmptyOrder => ErrorKind::EmptyOrder,
            CoreError::EntityNotFound { .. } => ErrorKind::EntityNotFound,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::CodeNotFound(_) => ErrorKind::CodeNotFound,
            CoreError::CodeInactive(_) => ErrorKind::CodeInactive,
            CoreError::CodeExpired(_) => ErrorKind::CodeExpired,
            CoreError::GlobalLimitReached(_) => ErrorKind::GlobalLimitReached,
            CoreError::PerCustomerLimitReached(_) => ErrorKind::PerCustomerLimitReached,
            CoreError::InvalidCodeKind { .. } => ErrorKind::InvalidCodeKind,
            CoreError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            CoreError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            CoreError::StorageFailure(_) => ErrorKind::StorageFailure,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Abstract response status for this error.
    ///
    /// ```text
    /// 400  validation, empty order, stock and every discount-code failure
    /// 404  unknown setting / item / order
    /// 409  concurrency conflict after retries
    /// 500  storage failure (after rollback)
    /// ```
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::EntityNotFound | ErrorKind::OrderNotFound => 404,
            ErrorKind::ConcurrencyConflict => 409,
            ErrorKind::StorageFailure => 500,
            _ => 400,
        }
    }

    /// Whether restarting the whole transaction against fresh state may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::ConcurrencyConflict { .. })
    }
}

/// Machine-readable error kinds, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    EmptyOrder,
    EntityNotFound,
    InsufficientStock,
    CodeNotFound,
    CodeInactive,
    CodeExpired,
    GlobalLimitReached,
    PerCustomerLimitReached,
    InvalidCodeKind,
    ConcurrencyConflict,
    OrderNotFound,
    StorageFailure,
    Validation,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any storage access so a malformed request never opens a
/// transaction.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
