// src/error.rs
use thiserror::Error;

/// Missing or malformed configuration. Fatal, raised before the poll loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("keyword file {path}: {reason}")]
    KeywordFile { path: String, reason: String },

    #[error("keyword set is empty")]
    EmptyKeywords,
}

/// A single failed fetch of the tender listing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed listing: {0}")]
    Decode(String),
}

/// A single channel failing to deliver a message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("{channel}: request failed: {source}")]
    Http {
        channel: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{channel}: rejected with HTTP {status}: {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },
}
