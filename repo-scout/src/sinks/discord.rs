use super::SinkError;
use crate::traits::NotificationSink;
use crate::types::Notification;
use crate::utils::text::{preview, truncate_chars};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// GitHub green.
pub const EMBED_COLOR: u32 = 0x238636;
/// Discord rejects messages with more than ten embeds.
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;
const MAX_EMBED_DESCRIPTION: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WebhookPayload<'a> {
    Content { content: String },
    Embeds { embeds: &'a [Embed] },
}

/// Posts to a Discord webhook.
pub struct DiscordSink {
    client: Client,
    webhook_url: String,
}

impl DiscordSink {
    pub fn new(webhook_url: &str) -> Result<Self, SinkError> {
        let parsed = url::Url::parse(webhook_url)
            .map_err(|e| SinkError::Config(format!("invalid webhook URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SinkError::Config(format!("unsupported webhook scheme: {}", parsed.scheme())));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
        })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<(), SinkError> {
        let response = self.client.post(&self.webhook_url).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body: preview(&body, 200),
        })
    }
}

pub fn summary_message(matched: usize, processed: usize) -> String {
    format!(
        "🔍 **GitHub Discovery Report**\nProcessed {} repos, found {} interesting projects.",
        processed, matched
    )
}

pub fn format_embed(notification: &Notification) -> Embed {
    let language = if notification.language.is_empty() {
        "Unknown"
    } else {
        notification.language.as_str()
    };
    let topics = if notification.topics.is_empty() {
        "none".to_string()
    } else {
        notification.topics.join(", ")
    };

    let mut description = format!("⭐ {} stars | 🗂️ {}\n\n", notification.stars, language);
    if !notification.description.is_empty() {
        description.push_str(&notification.description);
        description.push_str("\n\n");
    }
    description.push_str(&format!("**Topics:** {}\n\n", topics));
    description.push_str(&format!("💡 *{}*", notification.reason));

    Embed {
        title: notification.full_name.clone(),
        url: notification.url.clone(),
        description: truncate_chars(&description, MAX_EMBED_DESCRIPTION),
        color: EMBED_COLOR,
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn sink_name(&self) -> String {
        "Discord webhook".to_string()
    }

    async fn send_summary(&self, matched: usize, processed: usize) -> Result<(), SinkError> {
        self.post(&WebhookPayload::Content {
            content: summary_message(matched, processed),
        })
        .await?;
        debug!("Sent summary to Discord");
        Ok(())
    }

    async fn deliver(&self, batch: &[Notification]) -> Result<(), SinkError> {
        for chunk in batch.chunks(MAX_EMBEDS_PER_MESSAGE) {
            let embeds: Vec<Embed> = chunk.iter().map(format_embed).collect();
            self.post(&WebhookPayload::Embeds { embeds: &embeds }).await?;
        }
        info!("Sent {} repos to Discord", batch.len());
        Ok(())
    }
}
