//! # API Error Type
//!
//! What a failed command prints.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderService ── CoreError ──┐                                          │
//! │                              ├──► ApiError { code, status, message }    │
//! │  request file ── bad JSON ───┘            │                             │
//! │                                           ▼                             │
//! │                                  stderr (JSON), exit code 1             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use lustre_core::{CoreError, ErrorKind};
use serde::Serialize;

/// Structured command failure.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "status": 400,
///   "message": "Insufficient stock for setting s-1: available 1, requested 2"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorKind,

    /// Abstract response status (400 / 404 / 409 / 500)
    pub status: u16,

    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// A request that could not be read or parsed.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ApiError {
            code: ErrorKind::Validation,
            status: 400,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = match &err {
            // storage detail stays in the log
            CoreError::StorageFailure(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                "Order could not be processed; nothing was saved".to_string()
            }
            other => other.to_string(),
        };

        ApiError {
            code: err.kind(),
            status: err.status_code(),
            message,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
