use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::{Notification, Notifier, TenderCard};
use crate::error::DeliveryError;

const CHANNEL: &str = "discord";
const EMBED_COLOR: u32 = 0x00ff00;
// Discord caps embed titles at 256 characters and field values at 1024.
const TITLE_MAX: usize = 256;
const FIELD_MAX: usize = 1024;

/// Discord incoming webhook. Discord answers 204 on success.
#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    embeds: bool,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(30),
            embeds: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send plain `content` only, even for tender announcements.
    pub fn with_embeds(mut self, on: bool) -> Self {
        self.embeds = on;
        self
    }
}

#[derive(Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<EmbedField>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<DiscordEmbed>,
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

fn or_unspecified(v: Option<&str>, fallback: &str) -> String {
    clip(v.unwrap_or(fallback), FIELD_MAX)
}

impl DiscordEmbed {
    fn from_card(card: &TenderCard) -> Self {
        let keywords = if card.keywords.is_empty() {
            "-".to_string()
        } else {
            clip(&card.keywords.join(", "), FIELD_MAX)
        };
        Self {
            title: clip(&card.name, TITLE_MAX),
            description: format!("**ID:** {}", card.id),
            color: EMBED_COLOR,
            fields: vec![
                EmbedField {
                    name: "🏢 Comprador",
                    value: or_unspecified(card.buyer.as_deref(), "No especificado"),
                    inline: true,
                },
                EmbedField {
                    name: "📋 Estado",
                    value: or_unspecified(card.status.as_deref(), "No especificado"),
                    inline: true,
                },
                EmbedField {
                    name: "🏷️ Keywords Encontradas",
                    value: keywords,
                    inline: false,
                },
                EmbedField {
                    name: "📅 Fecha Cierre",
                    value: or_unspecified(card.closes_at.as_deref(), "No especificada"),
                    inline: true,
                },
            ],
        }
    }
}

impl<'a> DiscordWebhookPayload<'a> {
    fn build(msg: &'a Notification, embeds: bool) -> Self {
        let embeds = match (&msg.tender, embeds) {
            (Some(card), true) => vec![DiscordEmbed::from_card(card)],
            _ => Vec::new(),
        };
        Self {
            content: &msg.text,
            embeds,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, msg: &Notification) -> Result<(), DeliveryError> {
        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&DiscordWebhookPayload::build(msg, self.embeds))
            .send()
            .await
            // The webhook URL is itself the credential.
            .map_err(|e| DeliveryError::Http {
                channel: CHANNEL,
                source: e.without_url(),
            })?;

        let status = rsp.status();
        if status != StatusCode::NO_CONTENT {
            let body = rsp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                channel: CHANNEL,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        CHANNEL
    }
}
