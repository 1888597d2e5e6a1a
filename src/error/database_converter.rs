use crate::error::StorageError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Classifies Diesel errors into [`StorageError`] variants.
pub struct StorageErrorConverter;

impl StorageErrorConverter {
    /// Converts a Diesel error raised while running `operation`.
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> StorageError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                let source = error_source(&kind, info.message());
                Self::convert_database_error(kind, info.message(), source, operation)
            }
            other => StorageError::Query {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        message: &str,
        source: anyhow::Error,
        operation: &str,
    ) -> StorageError {
        match kind {
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::ForeignKeyViolation => StorageError::Constraint {
                operation: operation.to_string(),
                message: message.to_string(),
            },
            DatabaseErrorKind::ClosedConnection => StorageError::Connection { source },
            _ => StorageError::Query {
                operation: operation.to_string(),
                source,
            },
        }
    }
}

fn error_source(kind: &DatabaseErrorKind, message: &str) -> anyhow::Error {
    anyhow::anyhow!("{:?}: {}", kind, message)
}
