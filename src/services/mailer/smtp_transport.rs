use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use super::{DeliveryError, DeliveryTransport};
use crate::config::{SmtpConfig, TlsMode};

/// Connection and whole-operation timeout for a single delivery
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// SMTP transport backed by lettre's tokio client.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    hello_domain: String,
}

impl SmtpMailer {
    /// Builds the transport from configuration.
    ///
    /// Must be called inside a Tokio runtime: the connection pool spawns its
    /// reaper task on construction.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::InvalidAddress` if the sender address does not parse
    /// - `DeliveryError::Smtp` if TLS parameters cannot be built for the host
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let sender = config.sender();
        let from: Mailbox = sender
            .parse()
            .map_err(|source| DeliveryError::InvalidAddress {
                address: sender.to_string(),
                source,
            })?;

        let tls = match config.tls {
            TlsMode::Starttls => Tls::Required(TlsParameters::new(config.host.clone())?),
            TlsMode::Implicit => Tls::Wrapper(TlsParameters::new(config.host.clone())?),
            TlsMode::None => Tls::None,
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .tls(tls)
            .timeout(Some(DELIVERY_TIMEOUT));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let hello_domain = from.email.domain().to_string();

        Ok(Self {
            transport: builder.build(),
            from,
            hello_domain,
        })
    }

    fn build_message(&self, recipient: &str, subject: &str, body: &str) -> Result<Message, DeliveryError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|source| DeliveryError::InvalidAddress {
                address: recipient.to_string(),
                source,
            })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .message_id(Some(format!("<{}@{}>", Uuid::new_v4(), self.hello_domain)))
            .body(body.to_string())?;

        Ok(message)
    }
}

#[async_trait]
impl DeliveryTransport for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = self.build_message(recipient, subject, body)?;

        match tokio::time::timeout(DELIVERY_TIMEOUT, self.transport.send(message)).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    recipient = %recipient,
                    code = %response.code(),
                    "SMTP relay accepted message"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(DeliveryError::Smtp(e)),
            Err(_) => Err(DeliveryError::Timeout(DELIVERY_TIMEOUT)),
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
