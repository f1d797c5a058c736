//! Email alerts for operators.
//!
//! [`Notifier`] is the seam used by the forwarding client; [`SmtpNotifier`]
//! delivers plain-text mails through an authenticated SMTP relay.

use app_config::AppConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("No recipients configured")]
    NoRecipients,
}

/// Sends a short alert to the operators.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP implementation of [`Notifier`].
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Builds the notifier from the `smtp_*` and `notify_to` settings.
    ///
    /// No connection is opened until the first mail is sent.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(
                cfg.smtp_username.clone(),
                cfg.smtp_password.clone(),
            ))
            .build();

        let recipients = cfg
            .notify_to
            .iter()
            .map(|addr| addr.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        Ok(Self {
            transport,
            from: cfg.smtp_from.parse()?,
            recipients,
        })
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        build_message(&self.from, &self.recipients, subject, body)
    }
}

fn build_message(
    from: &Mailbox,
    recipients: &[Mailbox],
    subject: &str,
    body: &str,
) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN);
    for to in recipients {
        builder = builder.to(to.clone());
    }
    Ok(builder.body(body.to_string())?)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.build_message(subject, body)?;
        self.transport.send(message).await?;
        info!(subject, recipients = self.recipients.len(), "alert email sent");
        Ok(())
    }
}
