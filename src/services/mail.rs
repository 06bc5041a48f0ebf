//! Outbound mail for the booking relay.
//!
//! [`SmtpMailer`] wraps lettre's async SMTP transport. It is built once at
//! startup from [`SmtpConfig`]; without a complete SMTP configuration no
//! mailer exists and the booking endpoint refuses requests.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::SmtpConfig;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for mail delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A file attached to an outgoing message.
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// One outgoing booking message.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    /// Address replies should go to, if it parses.
    pub reply_to: Option<String>,
    pub attachment: Option<MailAttachment>,
}

/// Sends mail. Implemented by [`SmtpMailer`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

// ---------------------------------------------------------------------------
// SmtpMailer
// ---------------------------------------------------------------------------

/// Delivers mail through a configured SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport. Implicit TLS when `secure`, STARTTLS otherwise.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.pass.as_str().to_string(),
            ))
            .build();

        Ok(Self {
            transport,
            from: website_mailbox(&config.from)?,
            to: config.to.parse()?,
        })
    }

    fn build_message(&self, mail: OutgoingMail) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(mail.subject);

        if let Some(reply_to) = mail.reply_to.as_deref().and_then(|r| r.parse::<Mailbox>().ok()) {
            builder = builder.reply_to(reply_to);
        }

        let text = SinglePart::plain(mail.body);
        let result = match mail.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .or_else(|_| ContentType::parse("application/octet-stream"))
                    .map_err(|e| MailError::Build(e.to_string()))?;
                let part = Attachment::new(attachment.filename).body(attachment.data, content_type);
                builder.multipart(MultiPart::mixed().singlepart(text).singlepart(part))
            }
            None => builder.singlepart(text),
        };

        result.map_err(|e| MailError::Build(e.to_string()))
    }
}

/// `Website <address>`.
fn website_mailbox(address: &str) -> Result<Mailbox, MailError> {
    Ok(Mailbox::new(Some("Website".to_string()), address.parse()?))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let subject = mail.subject.clone();
        let message = self.build_message(mail)?;
        let response = self.transport.send(message).await?;

        tracing::info!(subject = %subject, code = %response.code(), "📧 Booking email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
