//! # lustre-db: Storage and Order Transaction Layer for Lustre Orders
//!
//! This crate owns the SQLite database and the transactional order flow
//! built on top of it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Lustre Orders Data Flow                            │
//! │                                                                         │
//! │  lustre place-order request.json                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     lustre-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │ (service/)    │    │ (repository/) │    │  (embedded)  │    │    │
//! │  │   │               │    │               │    │              │    │    │
//! │  │   │ OrderService  │───►│ settings      │    │ 001_initial  │    │    │
//! │  │   │ Reservation   │    │ items         │    │  _schema.sql │    │    │
//! │  │   │ Redemption    │    │ discount codes│    │              │    │    │
//! │  │   └───────┬───────┘    │ orders, stock │    └──────────────┘    │    │
//! │  │           │            └───────────────┘                        │    │
//! │  │           ▼                                                     │    │
//! │  │   ┌───────────────┐                                             │    │
//! │  │   │   Database    │  SqlitePool, WAL, busy timeout              │    │
//! │  │   │   (pool.rs)   │                                             │    │
//! │  │   └───────────────┘                                             │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database                             │    │
//! │  │   ~/.local/share/lustre/lustre.db (platform data dir)           │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories for catalog, codes and orders
//! - [`service`] - Reservation, redemption and the order transaction
//! - [`config`] - Environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lustre_db::{Database, DbConfig, OrderService};
//!
//! let db = Database::new(DbConfig::new("path/to/lustre.db")).await?;
//! let service = OrderService::new(db);
//!
//! let order = service.create_order(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::discount::DiscountCodeRepository;
pub use repository::item::ItemRepository;
pub use repository::order::OrderRepository;
pub use repository::setting::SettingRepository;

pub use service::{
    CodeCheck, DiscountRedemptionService, OrderService, Redemption, RetryPolicy,
    StockReservationEngine,
};
