// src/notify/mod.rs
pub mod discord;
pub mod telegram;

use metrics::counter;

use crate::config::AppConfig;
use crate::error::DeliveryError;
use crate::ingest::types::Tender;

pub use discord::DiscordNotifier;
pub use telegram::TelegramNotifier;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msg: &Notification) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

/// Text announcing a newly discovered tender.
pub fn format_tender_message(t: &Tender) -> String {
    format!("Nueva licitación encontrada: {} (ID: {})", t.name, t.id)
}

/// Text sent when polling gives up after consecutive fetch failures.
pub fn format_failure_message(attempts: u32, last_error: Option<&str>) -> String {
    let mut s = format!(
        "🚨 Error en monitoreo de licitaciones: se detuvo tras {attempts} intentos fallidos"
    );
    if let Some(e) = last_error {
        s.push_str(&format!(" ({e})"));
    }
    s
}

/// Structured view of a tender for channels that can render more than text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderCard {
    pub id: String,
    pub name: String,
    pub buyer: Option<String>,
    pub status: Option<String>,
    pub keywords: Vec<String>,
    pub closes_at: Option<String>,
}

impl TenderCard {
    pub fn new(t: &Tender, keywords: Vec<String>) -> Self {
        let status = t
            .extra
            .get("EstadoLicitacion")
            .and_then(display_value)
            .or_else(|| t.status_code.as_ref().and_then(display_value));
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            buyer: t.extra.get("Comprador").and_then(display_value),
            status,
            keywords,
            closes_at: t.closes_at.clone(),
        }
    }
}

// Strings and numbers render as-is; `{"NombreOrganismo": ..}` style objects
// (detail API) render their name.
fn display_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Object(m) => m
            .get("NombreOrganismo")
            .or_else(|| m.get("Nombre"))
            .and_then(display_value),
        _ => None,
    }
}

/// One message fanned out to every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub tender: Option<TenderCard>,
}

impl Notification {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tender: None,
        }
    }

    pub fn new_tender(t: &Tender, keywords: Vec<String>) -> Self {
        Self {
            text: format_tender_message(t),
            tender: Some(TenderCard::new(t, keywords)),
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: Vec<(&'static str, DeliveryError)>,
}

/// Zero or more channels that receive every message.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Channels enabled by configuration: Discord webhook when a URL is set,
    /// Telegram when both token and chat id are set.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut mux = Self::default();
        if let Some(url) = &cfg.webhook_url {
            mux.push(Box::new(
                DiscordNotifier::new(url.clone()).with_timeout(cfg.http_timeout),
            ));
        }
        if let Some(tg) = &cfg.telegram {
            mux.push(Box::new(
                TelegramNotifier::new(tg.token.clone(), tg.chat_id.clone())
                    .with_timeout(cfg.http_timeout),
            ));
        }
        if mux.is_empty() {
            tracing::warn!("no notification channels configured; matches will only be logged");
        }
        mux
    }

    pub fn push(&mut self, ch: Box<dyn Notifier>) {
        self.channels.push(ch);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send `msg` through every channel, one after another. A failing
    /// channel is logged and recorded; the remaining channels still run.
    pub async fn broadcast(&self, msg: &Notification) -> Delivery {
        let mut out = Delivery::default();
        for ch in &self.channels {
            match ch.send(msg).await {
                Ok(()) => {
                    counter!("tender_notifications_sent_total", "channel" => ch.name()).increment(1);
                    out.delivered += 1;
                }
                Err(e) => {
                    counter!("tender_notifications_failed_total", "channel" => ch.name())
                        .increment(1);
                    tracing::warn!(error = %e, channel = ch.name(), "notification delivery failed");
                    out.failed.push((ch.name(), e));
                }
            }
        }
        out
    }
}
