//! # Database Pool Management
//!
//! Opens the SQLite pool the repositories and order services share.
//!
//! ## Connection Use
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path) ──► Database::new ──► migrations ──► SqlitePool    │
//! │                                                                         │
//! │   reads (list / get)          one pooled connection per call            │
//! │   create_order attempt        BEGIN IMMEDIATE pins one connection for   │
//! │                               reserve → redeem → insert → COMMIT        │
//! │                                                                         │
//! │   WAL journal:  readers never wait for the writer                       │
//! │   busy_timeout: an order waits at most this long for the write lock,    │
//! │                 then gets SQLITE_BUSY (a retryable conflict upstream)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::discount::DiscountCodeRepository;
use crate::repository::item::ItemRepository;
use crate::repository::order::OrderRepository;
use crate::repository::setting::SettingRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/lustre/lustre.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file; created on first connect. `:memory:` for tests.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// How long `acquire` / `begin` waits for a free connection.
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Upper bound on waiting for the write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply embedded migrations on connect. Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Private in-memory database for tests.
    ///
    /// Limited to one connection: each new connection to `:memory:` would
    /// see its own empty database. Code running inside an order transaction
    /// must therefore use the transaction's connection for every query.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(":memory:")
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the pool plus repository accessors. Clones share the pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./lustre.db")).await?;
/// let recent = db.orders().list_for_customer("cust-1").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects, applies the SQLite pragmas and (optionally) migrates.
    ///
    /// Pragmas: `journal_mode=WAL`, `synchronous=NORMAL`, `foreign_keys=ON`,
    /// `busy_timeout` from the config.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        // mode=rwc creates the file if needed
        let url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The raw pool; the order services begin their transactions here.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> SettingRepository {
        SettingRepository::new(self.pool.clone())
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone())
    }

    pub fn discount_codes(&self) -> DiscountCodeRepository {
        DiscountCodeRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        debug!("Closing database pool");
        self.pool.close().await;
    }

    /// `SELECT 1` round trip.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
