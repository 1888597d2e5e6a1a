use crate::error::StorageError;
use crate::jobs::JobError;
use crate::services::mailer::DeliveryError;
use thiserror::Error;

/// Application-wide error type.
///
/// Wraps the typed errors of each component and adds the front-end and
/// configuration failures that never reach the dispatch core.
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected job-creation or command input
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Job repository failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Mail transport failure
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Poll loop or executor lifecycle failure
    #[error(transparent)]
    Scheduler(#[from] JobError),

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<crate::config::error::ConfigError> for AppError {
    fn from(error: crate::config::error::ConfigError) -> Self {
        let key = error.field().unwrap_or("settings").to_string();
        AppError::Configuration {
            key,
            source: anyhow::Error::from(error),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, String)> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "invalid value".to_string());
                (field.to_string(), reason)
            })
            .collect();
        fields.sort();

        match fields.into_iter().next() {
            Some((field, reason)) => AppError::Validation { field, reason },
            None => AppError::validation("request", "invalid request"),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
