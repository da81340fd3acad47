pub mod http;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, email: &OutboundEmail) -> anyhow::Result<()>;
}

/// Used when no mail API is configured: emails only reach the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(&self, email: &OutboundEmail) -> anyhow::Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "email (not delivered, no mail API configured)");
        Ok(())
    }
}
