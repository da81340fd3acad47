use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use super::{Mailer, OutboundEmail};

/// Sends mail through a JSON HTTP API (`POST {url}` with a bearer key).
pub struct HttpMailer {
    api_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_email(&self, email: &OutboundEmail) -> anyhow::Result<()> {
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.body,
            })
            .send()
            .await
            .context("failed to reach mail API")?
            .error_for_status()
            .context("mail API returned error")?;

        Ok(())
    }
}
