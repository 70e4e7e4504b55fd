use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use s3logs2parquet_config::EmailConfig;
use tracing::{debug, info};

use super::{EmailReport, NotifyError, Notifier};

/// Sends the report over SMTP with STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    reply_to: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Build the transport and parse every address up front, so a bad
    /// address is reported before the pipeline starts.
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        let recipients = config
            .recipients
            .iter()
            .map(|r| mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            host = %config.smtp_host,
            port = config.smtp_port,
            recipients = recipients.len(),
            "SMTP transport configured"
        );

        Ok(Self {
            transport,
            from: mailbox(&config.from)?,
            reply_to: mailbox(&config.reply_to)?,
            recipients,
        })
    }

    fn message(&self, report: &EmailReport) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .reply_to(self.reply_to.clone())
            .subject(report.subject.as_str());
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                report.text.clone(),
                report.html.clone(),
            ))
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, report: &EmailReport) -> Result<(), NotifyError> {
        let message = self.message(report)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        info!(recipients = self.recipients.len(), subject = %report.subject, "report sent");
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.trim().parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
