// src/ingest/mercado_publico.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::error::SourceError;
use crate::ingest::types::{Listing, QueryParams, Tender, TenderSource};

pub const DEFAULT_BASE_URL: &str = "https://api.mercadopublico.cl/servicios/v1/publico";

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(rename = "Cantidad", default)]
    count: Option<u64>,
    #[serde(rename = "Listado")]
    listing: Vec<Tender>,
}

/// Decode a `licitaciones.json` body into a listing.
pub fn parse_listing(body: &str) -> Result<Listing, SourceError> {
    let rsp: ListingResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    if let Some(n) = rsp.count {
        tracing::debug!(reported = n, decoded = rsp.listing.len(), "listing decoded");
    }
    Ok(rsp.listing)
}

pub struct MercadoPublicoClient {
    base_url: String,
    client: reqwest::Client,
}

impl MercadoPublicoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn listing_url(&self) -> String {
        format!("{}/licitaciones.json", self.base_url)
    }
}

#[async_trait]
impl TenderSource for MercadoPublicoClient {
    async fn fetch(&self, params: &QueryParams) -> Result<Listing, SourceError> {
        let t0 = std::time::Instant::now();
        counter!("tender_fetch_total").increment(1);

        let rsp = self
            .client
            .get(self.listing_url())
            .query(params)
            .send()
            .await
            // The query string carries the access token; keep it out of logs.
            .map_err(|e| SourceError::Http(e.without_url()))?;

        let status = rsp.status();
        let body = rsp
            .text()
            .await
            .map_err(|e| SourceError::Http(e.without_url()))?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let listing = parse_listing(&body)?;
        histogram!("tender_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(listing)
    }

    fn name(&self) -> &'static str {
        "mercado-publico"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_listado_and_keeps_extra_fields() {
        let body = r#"{
            "Cantidad": 2,
            "FechaCreacion": "2025-06-01T10:00:00",
            "Listado": [
                {"CodigoExterno": "1509-5-L114", "Nombre": "Curso de Excel", "CodigoEstado": 5, "FechaCierre": "2025-06-10T15:00:00"},
                {"CodigoExterno": "2300-12-LE25", "Nombre": "Compra de sillas", "Comprador": "Municipalidad"}
            ]
        }"#;
        let listing = parse_listing(body).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, "1509-5-L114");
        assert_eq!(listing[0].status_code, Some(serde_json::json!(5)));
        assert_eq!(listing[0].closes_at.as_deref(), Some("2025-06-10T15:00:00"));
        assert_eq!(
            listing[1].extra.get("Comprador"),
            Some(&serde_json::json!("Municipalidad"))
        );
    }

    #[test]
    fn string_status_code_does_not_fail_the_listing() {
        let body = r#"{"Listado": [
            {"CodigoExterno": "A", "Nombre": "Curso", "CodigoEstado": "5"},
            {"CodigoExterno": "B", "Nombre": "Taller", "CodigoEstado": null}
        ]}"#;
        let listing = parse_listing(body).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].status_code, Some(serde_json::json!("5")));
        assert_eq!(listing[1].status_code, None);
    }

    #[test]
    fn missing_listado_is_a_decode_error() {
        let err = parse_listing(r#"{"Cantidad": 0}"#).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn record_without_identifier_is_a_decode_error() {
        let err = parse_listing(r#"{"Listado": [{"Nombre": "Taller"}]}"#).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = parse_listing("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let c = MercadoPublicoClient::new("http://localhost:1/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.listing_url(), "http://localhost:1/api/licitaciones.json");
    }
}
