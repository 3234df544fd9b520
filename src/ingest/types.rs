// src/ingest/types.rs
use std::collections::BTreeMap;

use crate::error::SourceError;

/// One tender record as published by the upstream listing.
///
/// Only the identifier and the name are interpreted. Everything else the
/// API sends is kept in `extra` and passed through untouched.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Tender {
    #[serde(rename = "CodigoExterno")]
    pub id: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    // Numeric upstream, but only displayed; any JSON shape is accepted so a
    // single odd record cannot fail the whole listing.
    #[serde(rename = "CodigoEstado", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<serde_json::Value>,
    #[serde(rename = "FechaCierre", default, skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Tender {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status_code: None,
            closes_at: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Tenders returned by one fetch. Order carries no meaning.
pub type Listing = Vec<Tender>;

/// Query parameters forwarded verbatim to the upstream service.
pub type QueryParams = BTreeMap<String, String>;

#[async_trait::async_trait]
pub trait TenderSource: Send + Sync {
    /// Exactly one attempt; retry policy lives in the poll loop.
    async fn fetch(&self, params: &QueryParams) -> Result<Listing, SourceError>;
    fn name(&self) -> &'static str;
}
