// src/config.rs
//! Process configuration, read from the environment (and `.env` when present).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::filter::KeywordSet;
use crate::ingest::mercado_publico::DEFAULT_BASE_URL;
use crate::ingest::poller::PollCfg;
use crate::ingest::types::QueryParams;

pub const ENV_API_TOKEN: &str = "SOURCE_API_TOKEN";
pub const ENV_API_BASE_URL: &str = "SOURCE_API_BASE_URL";
pub const ENV_TENDER_STATUS: &str = "SOURCE_TENDER_STATUS";
pub const ENV_WEBHOOK_URL: &str = "NOTIFY_WEBHOOK_URL";
pub const ENV_WEBHOOK_DISABLED: &str = "NOTIFY_WEBHOOK_DISABLED";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_POLL_PERIOD: &str = "POLL_PERIOD_SECS";
pub const ENV_MAX_RETRIES: &str = "POLL_MAX_RETRIES";
pub const ENV_KEYWORDS: &str = "TENDER_KEYWORDS";
pub const ENV_KEYWORDS_PATH: &str = "TENDER_KEYWORDS_PATH";
pub const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

const DEFAULT_STATUS: &str = "activas";

#[derive(Debug, Clone)]
pub struct TelegramCfg {
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_token: String,
    pub api_base_url: String,
    pub tender_status: String,
    pub webhook_url: Option<String>,
    pub telegram: Option<TelegramCfg>,
    pub poll: PollCfg,
    pub keywords: KeywordSet,
    pub http_timeout: Duration,
    pub metrics_addr: Option<std::net::SocketAddr>,
}

impl AppConfig {
    /// Read the process environment. Binaries load `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_token = get(ENV_API_TOKEN).ok_or(ConfigError::Missing(ENV_API_TOKEN))?;

        let webhook_disabled = get(ENV_WEBHOOK_DISABLED).is_some_and(|v| v == "1");
        let webhook_url = match get(ENV_WEBHOOK_URL) {
            Some(u) => Some(u),
            None if webhook_disabled => None,
            None => return Err(ConfigError::Missing(ENV_WEBHOOK_URL)),
        };

        let telegram = match (get(ENV_TELEGRAM_TOKEN), get(ENV_TELEGRAM_CHAT_ID)) {
            (Some(token), Some(chat_id)) => Some(TelegramCfg { token, chat_id }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(ENV_TELEGRAM_CHAT_ID)),
            (None, Some(_)) => return Err(ConfigError::Missing(ENV_TELEGRAM_TOKEN)),
        };

        let period = parse_u64(ENV_POLL_PERIOD, get(ENV_POLL_PERIOD), 3600)?;
        if period == 0 {
            return Err(ConfigError::Invalid {
                var: ENV_POLL_PERIOD,
                reason: "must be greater than 0".into(),
            });
        }
        let max_retries = parse_u64(ENV_MAX_RETRIES, get(ENV_MAX_RETRIES), 5)?;
        let max_retries = u32::try_from(max_retries)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| ConfigError::Invalid {
                var: ENV_MAX_RETRIES,
                reason: "must be between 1 and 4294967295".into(),
            })?;

        let http_timeout = parse_u64(ENV_HTTP_TIMEOUT, get(ENV_HTTP_TIMEOUT), 30)?;
        if http_timeout == 0 {
            return Err(ConfigError::Invalid {
                var: ENV_HTTP_TIMEOUT,
                reason: "must be greater than 0".into(),
            });
        }

        let metrics_addr: Option<std::net::SocketAddr> = match get(ENV_METRICS_ADDR) {
            None => None,
            Some(a) => Some(a.parse().map_err(|e| ConfigError::Invalid {
                var: ENV_METRICS_ADDR,
                reason: format!("{e}"),
            })?),
        };

        let keywords = resolve_keywords(get(ENV_KEYWORDS), get(ENV_KEYWORDS_PATH))?;

        Ok(Self {
            api_token,
            api_base_url: get(ENV_API_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            tender_status: get(ENV_TENDER_STATUS).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            webhook_url,
            telegram,
            poll: PollCfg {
                period: Duration::from_secs(period),
                max_retries,
            },
            keywords,
            http_timeout: Duration::from_secs(http_timeout),
            metrics_addr,
        })
    }

    /// Query string sent with every fetch.
    pub fn query_params(&self) -> QueryParams {
        let mut p = QueryParams::new();
        p.insert("ticket".into(), self.api_token.clone());
        p.insert("estado".into(), self.tender_status.clone());
        p
    }
}

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(s) => s.parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("{s:?} is not a non-negative integer"),
        }),
    }
}

/// Precedence: inline list > keyword file (explicit path, then
/// `config/keywords.toml`, then `config/keywords.json`) > built-in defaults.
fn resolve_keywords(
    inline: Option<String>,
    path: Option<String>,
) -> Result<KeywordSet, ConfigError> {
    let ks = if let Some(list) = inline {
        KeywordSet::new(list.split(','))
    } else if let Some(p) = path {
        let pb = PathBuf::from(&p);
        if !pb.exists() {
            return Err(ConfigError::KeywordFile {
                path: p,
                reason: "no such file".into(),
            });
        }
        load_keywords_from(&pb)?
    } else {
        load_keywords_fallback()?.unwrap_or_default()
    };

    if ks.is_empty() {
        return Err(ConfigError::EmptyKeywords);
    }
    Ok(ks)
}

fn load_keywords_fallback() -> Result<Option<KeywordSet>, ConfigError> {
    for p in ["config/keywords.toml", "config/keywords.json"] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_keywords_from(&pb).map(Some);
        }
    }
    Ok(None)
}

/// Load a keyword file: TOML (`keywords = [...]`) or a JSON array.
pub fn load_keywords_from(path: &Path) -> Result<KeywordSet, ConfigError> {
    let file_err = |reason: String| ConfigError::KeywordFile {
        path: path.display().to_string(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_keywords(&content, &ext).map_err(file_err)
}

fn parse_keywords(s: &str, hint_ext: &str) -> Result<KeywordSet, String> {
    #[derive(serde::Deserialize)]
    struct TomlKeywords {
        keywords: Vec<String>,
    }

    let try_toml = hint_ext == "toml" || s.contains("keywords");
    if try_toml {
        if let Ok(v) = toml::from_str::<TomlKeywords>(s) {
            return Ok(KeywordSet::new(v.keywords));
        }
    }
    if let Ok(v) = serde_json::from_str::<Vec<String>>(s) {
        return Ok(KeywordSet::new(v));
    }
    if !try_toml {
        if let Ok(v) = toml::from_str::<TomlKeywords>(s) {
            return Ok(KeywordSet::new(v.keywords));
        }
    }
    Err("unsupported keyword file format".into())
}
