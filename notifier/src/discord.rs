//! Posting announcements to a Discord channel through a webhook.

use crate::notify::NotificationChannel;
use eyre::Context;
use serde::Serialize;
use tracing::instrument;

/// Body of a webhook execution.
///
/// See: <https://discord.com/developers/docs/resources/webhook#execute-webhook>
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// A Discord webhook URL to post plain-text messages to.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    url: String,
    client: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl NotificationChannel for DiscordWebhook {
    #[instrument(skip_all, level = tracing::Level::DEBUG)]
    async fn post_message(&self, text: &str) -> eyre::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookMessage { content: text })
            .send()
            .await
            .context("send Discord webhook request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Discord webhook failed with status {status}: {body}");
        }

        tracing::trace!(%status, "Discord accepted message");
        Ok(())
    }
}
