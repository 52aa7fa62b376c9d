//! # Database Error Types
//!
//! ```text
//! sqlx::Error ──► DbError ──► CoreError
//!                   │
//!                   ├── Busy (BUSY / LOCKED, any extended code) ──► ConcurrencyConflict (retryable)
//!                   ├── Invalid (rejected before SQL) ────────────► Validation
//!                   └── everything else ──────────────────────────► StorageFailure
//! ```
//!
//! Constraint failures are classified with sqlx's [`DatabaseError::kind`],
//! lock contention with SQLite's primary result code.
//!
//! [`DatabaseError::kind`]: sqlx::error::DatabaseError::kind

use lustre_core::{CoreError, ValidationError};
use sqlx::error::{DatabaseError, ErrorKind as SqlErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE or PRIMARY KEY constraint rejected the row
    /// (duplicate code, slug or SKU).
    #[error("Already exists: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK or NOT NULL, e.g. `stock >= 0`.
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Lock contention: the busy timeout ran out, or a WAL read snapshot went
    /// stale before the transaction could write (`SQLITE_BUSY_SNAPSHOT`).
    /// Restarting the transaction may succeed.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A JSON column could not be encoded or decoded.
    #[error("Corrupt column {column}: {message}")]
    Corrupt { column: String, message: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A record was rejected before reaching SQL.
    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn corrupt(column: impl Into<String>, err: serde_json::Error) -> Self {
        DbError::Corrupt {
            column: column.into(),
            message: err.to_string(),
        }
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// BUSY / LOCKED and their extended codes (BUSY_SNAPSHOT 517, BUSY_RECOVERY
/// 261, LOCKED_SHAREDCACHE 262, ...). The primary code is the low byte.
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xFF)
        .is_some_and(|primary| primary == SQLITE_BUSY || primary == SQLITE_LOCKED)
}

fn classify(db_err: &dyn DatabaseError) -> DbError {
    let message = db_err.message().to_string();

    if is_busy_code(db_err.code().as_deref()) || message.contains("database is locked") {
        return DbError::Busy(message);
    }

    match db_err.kind() {
        SqlErrorKind::UniqueViolation => DbError::UniqueViolation {
            // "UNIQUE constraint failed: items.sku"
            constraint: message
                .rsplit(": ")
                .next()
                .unwrap_or(message.as_str())
                .to_string(),
        },
        SqlErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
        SqlErrorKind::CheckViolation | SqlErrorKind::NotNullViolation => {
            DbError::CheckViolation { message }
        }
        _ => DbError::QueryFailed(message),
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => classify(db_err.as_ref()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Storage errors as the order services report them.
impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Busy(msg) => CoreError::conflict(format!("database ({msg})"), 1),
            DbError::Invalid(e) => CoreError::Validation(e),
            other => CoreError::StorageFailure(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
