use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::{Notification, Notifier};
use crate::error::DeliveryError;

const CHANNEL: &str = "telegram";
const API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API `sendMessage` to a single chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            token,
            chat_id,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point at a different Bot API host (self-hosted bot server, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, msg: &Notification) -> Result<(), DeliveryError> {
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &msg.text,
            })
            .send()
            .await
            // reqwest errors carry the URL, which embeds the bot token.
            .map_err(|e| DeliveryError::Http {
                channel: CHANNEL,
                source: e.without_url(),
            })?;

        let status = rsp.status();
        if status != StatusCode::OK {
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
