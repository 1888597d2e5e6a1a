//! Mail delivery transports.
//!
//! `DeliveryTransport` is the seam the dispatch executor sends through.
//! `SmtpMailer` is the production implementation on top of lettre's async
//! SMTP client.

mod error;
mod smtp_transport;
mod transport;

pub use error::DeliveryError;
pub use smtp_transport::{DELIVERY_TIMEOUT, SmtpMailer};
pub use transport::DeliveryTransport;
