use async_trait::async_trait;

use super::DeliveryError;

/// Outbound mail transport.
///
/// Implementations are stateless from the caller's perspective: configuration
/// is fixed at construction and a call either delivers the whole message or
/// fails with [`DeliveryError`].
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Sends a plain-text message to a single recipient.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;

    /// Returns the transport name for logging
    fn name(&self) -> &'static str;
}
