use thiserror::Error;

/// Failure of the job repository.
///
/// Raised when the store is unreachable or a query/write fails. The poll loop
/// and dispatch tasks log and swallow these; only establishing the connection
/// at startup treats them as fatal.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The connection pool could not hand out a connection
    #[error("Database connection unavailable")]
    Connection {
        #[source]
        source: anyhow::Error,
    },

    /// A statement failed for a reason other than a constraint
    #[error("Database operation failed: {operation}")]
    Query {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Unique, not-null or check constraint violation
    #[error("Constraint violated during {operation}: {message}")]
    Constraint { operation: String, message: String },

    /// Schema migration failure
    #[error("Migration failed: {0}")]
    Migration(String),

    /// The store refused the operation (e.g. an in-memory store taken offline)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn connection(source: impl Into<anyhow::Error>) -> Self {
        StorageError::Connection {
            source: source.into(),
        }
    }
}
