use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("transaction '{transaction_id}' already exists")]
    Duplicate { transaction_id: String },

    #[error("transaction '{transaction_id}' not found")]
    NotFound { transaction_id: String },

    #[error("database connection error: {message}")]
    Connection { message: String },

    #[error("database query failed: {message}")]
    Query { message: String },

    #[error("database migration failed: {message}")]
    Migration { message: String },
}

impl StoreError {
    pub fn duplicate(transaction_id: impl Into<String>) -> Self {
        Self::Duplicate {
            transaction_id: transaction_id.into(),
        }
    }

    pub fn not_found(transaction_id: impl Into<String>) -> Self {
        Self::NotFound {
            transaction_id: transaction_id.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }

    /// Transient errors are worth retrying; constraint violations and
    /// missing rows are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }

    /// Map a sqlx error onto the store taxonomy. The key used in the
    /// failing statement is not recoverable from sqlx, so callers that know
    /// it should re-wrap `Duplicate`/`NotFound` with the concrete id.
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("unknown"),
            sqlx::Error::PoolTimedOut => Self::connection("connection pool exhausted"),
            sqlx::Error::PoolClosed => Self::connection("connection pool is closed"),
            sqlx::Error::Io(io_err) => Self::connection(io_err.to_string()),
            sqlx::Error::Configuration(msg) => Self::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                // 23505 is the Postgres unique-violation class.
                if db_err.code().as_deref() == Some("23505") {
                    Self::duplicate("unknown")
                } else {
                    Self::query(db_err.message().to_string())
                }
            }
            other => Self::query(other.to_string()),
        }
    }
}
