//! # Stock Reservation Engine
//!
//! Validates and decrements stock for one entity reference of one line.
//!
//! ## Reserve Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve(conn, kind, id, qty)                                           │
//! │                                                                         │
//! │   ┌──► read entity ──── missing? ──────────────► EntityNotFound         │
//! │   │        │                                                            │
//! │   │        ├── stock < qty? ───────────────────► InsufficientStock      │
//! │   │        ▼                                                            │
//! │   │   CAS decrement (version = observed)                                │
//! │   │        │                                                            │
//! │   │        ├── 1 row ──────────────────────────► Ok(snapshot)           │
//! │   │        ▼                                                            │
//! │   └── 0 rows, attempts left                                             │
//! │            │                                                            │
//! │            └── exhausted ──────────────────────► ConcurrencyConflict    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The snapshot comes from the validated pre-image: the price the customer
//! pays is the price of the row that the CAS matched.
//!
//! The engine never commits. The caller's transaction owns the decrement,
//! so a later failure (or a dropped future) rolls it back.

use chrono::{DateTime, Utc};
use lustre_core::{CoreError, CoreResult, EntityKind, EntitySnapshot};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use super::RetryPolicy;
use crate::repository::{item, setting, stock};

/// Check-then-decrement of stock, atomic per entity.
#[derive(Debug, Clone, Default)]
pub struct StockReservationEngine {
    retry: RetryPolicy,
}

impl StockReservationEngine {
    pub fn new(retry: RetryPolicy) -> Self {
        StockReservationEngine { retry }
    }

    /// Reserves `quantity` units of the referenced entity.
    ///
    /// ## Errors
    /// * `EntityNotFound` - No such setting / item
    /// * `InsufficientStock` - `stock < quantity`; nothing is decremented
    /// * `ConcurrencyConflict` - The row kept changing under us
    /// * `StorageFailure` / retryable conflict - From the store
    pub async fn reserve(
        &self,
        conn: &mut SqliteConnection,
        kind: EntityKind,
        id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<EntitySnapshot> {
        for attempt in 1..=self.retry.max_attempts {
            let (snapshot, level) = match load(&mut *conn, kind, id).await? {
                Some(found) => found,
                None => {
                    return Err(CoreError::EntityNotFound {
                        kind,
                        id: id.to_string(),
                    })
                }
            };

            if level.stock < quantity {
                debug!(kind = %kind, id = %id, available = level.stock, requested = quantity, "Insufficient stock");
                return Err(CoreError::InsufficientStock {
                    kind,
                    id: id.to_string(),
                    available: level.stock,
                    requested: quantity,
                });
            }

            if stock::try_decrement(&mut *conn, kind, id, quantity, level.version, now).await? {
                debug!(kind = %kind, id = %id, quantity, remaining = level.stock - quantity, "Reserved stock");
                return Ok(snapshot);
            }

            warn!(kind = %kind, id = %id, attempt, "Stock changed concurrently, re-validating");
        }

        Err(CoreError::conflict(
            format!("{} {}", kind, id),
            self.retry.max_attempts,
        ))
    }
}

/// Reads the entity and its stock level in one query.
async fn load(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &str,
) -> CoreResult<Option<(EntitySnapshot, stock::StockLevel)>> {
    let found = match kind {
        EntityKind::Setting => setting::find_by_id(conn, id).await?.map(|s| {
            let level = stock::StockLevel {
                stock: s.stock,
                version: s.version,
            };
            (EntitySnapshot::Setting(s.snapshot()), level)
        }),
        EntityKind::Item => item::find_by_id(conn, id).await?.map(|i| {
            let level = stock::StockLevel {
                stock: i.stock,
                version: i.version,
            };
            (EntitySnapshot::Item(i.snapshot()), level)
        }),
    };
    Ok(found)
}

// =============================================================================
// Unit Tests
// =============================================================================
