//! Delivery of the usage report.

mod smtp;

use async_trait::async_trait;
use thiserror::Error;

pub use smtp::SmtpNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// A rendered report ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReport {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl EmailReport {
    pub fn subject_for(database: &str) -> String {
        format!("[INTERNAL] Your {} Usage Stats Report", database.to_uppercase())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, report: &EmailReport) -> Result<(), NotifyError>;
}
