use std::time::Duration;

use thiserror::Error;

/// Failure to hand a message to the mail relay.
///
/// Any variant results in the job being recorded as `FAILED`; deliveries are
/// never retried within the same task.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid mail address '{address}'")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to build message")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport failed")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}
