//! # Storage and Ledger Errors
//!
//! One error type for everything `dispensary-db` returns, plus the
//! configuration error.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_*()        ValidationError ──┐                                │
//! │  ledger rules        CoreError ────────┼──► DbError::Domain(..)         │
//! │  SQLite / pool       sqlx::Error ──────┴──► categorised by message      │
//! │                                                                         │
//! │  Ledger: any Err ──► ROLLBACK ──► warn!(code, error) ──► caller         │
//! │  Caller branches on DbError::code():                                    │
//! │      "DUPLICATE_VISIT", "MEDICINE_NOT_FOUND", "CONSTRAINT_VIOLATION"... │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use dispensary_core::{CoreError, ValidationError};
use thiserror::Error;

/// Errors from repositories and the ledger.
#[derive(Debug, Error)]
pub enum DbError {
    /// A ledger rule rejected the operation (duplicate bill, unknown
    /// medicine, ...). Nothing was written.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index fired. The ledger checks bill numbers and same-day
    /// visits before inserting, so seeing this from a submission means a
    /// write bypassed the ledger.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint failed, or an UPDATE/DELETE hit an append-only
    /// event table.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The database file could not be opened or created.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN or COMMIT failed, typically the write lock was not granted
    /// within the busy timeout.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

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

    /// The ledger rule behind this error, if any.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Stable machine-readable code. Domain errors keep their own code.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Domain(err) => err.code(),
            DbError::NotFound { .. } => "NOT_FOUND",
            DbError::UniqueViolation { .. } => "UNIQUE_VIOLATION",
            DbError::ForeignKeyViolation { .. } => "FOREIGN_KEY_VIOLATION",
            DbError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            DbError::ConnectionFailed(_) => "CONNECTION_FAILED",
            DbError::MigrationFailed(_) => "MIGRATION_FAILED",
            DbError::QueryFailed(_) => "QUERY_FAILED",
            DbError::TransactionFailed(_) => "TRANSACTION_FAILED",
            DbError::PoolExhausted => "POOL_EXHAUSTED",
            DbError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// SQLite reports constraint failures only through the message text:
///
/// ```text
/// "UNIQUE constraint failed: bills.bill_no"   → UniqueViolation { field }
/// "FOREIGN KEY constraint failed"             → ForeignKeyViolation
/// "CHECK constraint failed: ..."              → ConstraintViolation
/// "bill_particulars is append-only"           → ConstraintViolation
/// anything else from the database             → QueryFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                //   "CHECK constraint failed: <expr>"
                //   RAISE(ABORT, '<text>') from triggers
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") || msg.contains("append-only") {
                    DbError::ConstraintViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while loading or saving `dispensary.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_code_passes_through() {
        let err: DbError = CoreError::DuplicateBill {
            bill_number: "B1".to_string(),
        }
        .into();
        assert_eq!(err.code(), "DUPLICATE_BILL");
        assert!(err.as_domain().is_some());
        assert_eq!(err.to_string(), "Bill number B1 already exists");
    }

    #[test]
    fn test_validation_becomes_domain() {
        let err: DbError = ValidationError::Empty {
            field: "items".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[test]
    fn test_row_not_found_maps() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
