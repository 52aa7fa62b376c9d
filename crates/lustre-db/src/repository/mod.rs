//! # Repository Module
//!
//! Database repository implementations for Lustre Orders.
//!
//! ## Two Access Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Access                                    │
//! │                                                                         │
//! │  Pool-level (operators, CLI, tests)                                     │
//! │       db.settings().insert(&setting)                                    │
//! │       db.orders().list_for_customer("cust-1")                           │
//! │       │  acquires a pooled connection per call                          │
//! │       ▼                                                                 │
//! │  Connection-level (inside an order transaction)                         │
//! │       setting::find_by_id(&mut *tx, id)                                 │
//! │       stock::try_decrement(&mut *tx, kind, id, qty, version, now)       │
//! │       discount::try_increment_usage(&mut *tx, id, version, now)         │
//! │       order::insert(&mut *tx, &order)                                   │
//! │       │  runs on the caller's transaction connection                    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Pool-level methods delegate to the connection-level functions, so      │
//! │  there is exactly one SQL statement per operation.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SettingRepository`](setting::SettingRepository) - Settings
//! - [`ItemRepository`](item::ItemRepository) - Stones and other items
//! - [`DiscountCodeRepository`](discount::DiscountCodeRepository) - Codes
//! - [`OrderRepository`](order::OrderRepository) - Orders and their lines
//! - [`stock`] - Conditional stock writes shared by settings and items

pub mod discount;
pub mod item;
pub mod order;
pub mod setting;
pub mod stock;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DbError, DbResult};

/// Encodes a value for a JSON TEXT column.
pub(crate) fn to_json<T: Serialize + ?Sized>(column: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::corrupt(column, e))
}

/// Decodes a JSON TEXT column.
pub(crate) fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> DbResult<T> {
    serde_json::from_str(raw).map_err(|e| DbError::corrupt(column, e))
}

/// Helper to generate a new record ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
