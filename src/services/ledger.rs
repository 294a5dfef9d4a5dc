//! Ledger registry client
//!
//! Supplies the raw gateway listing. The registry endpoint is known to
//! wrap its JSON body in HTML on occasion and has served both a bare
//! array and an `{ items, totalItems }` envelope, so parsing is lenient.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::LedgerError;
use crate::normalizer::RawGatewayRecord;

/// One page of the ledger's gateway listing.
#[derive(Debug)]
pub struct GatewayPage {
    pub items: Vec<RawGatewayRecord>,
    pub total_items: u64,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the gateway listing, optionally capped at `limit` items.
    async fn list_gateways(&self, limit: Option<u64>) -> Result<GatewayPage, LedgerError>;
}

pub struct HttpLedgerClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpLedgerClient {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn list_gateways(&self, limit: Option<u64>) -> Result<GatewayPage, LedgerError> {
        let mut request = self.http.get(&self.endpoint);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let body = request
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_listing(&body)
    }
}

/// Parse a listing body into records, tolerating HTML wrapping and both
/// known response shapes.
fn parse_listing(body: &str) -> Result<GatewayPage, LedgerError> {
    let value = serde_json::from_str::<Value>(body)
        .ok()
        .or_else(|| extract_embedded_json(body))
        .ok_or_else(|| LedgerError::MalformedBody("no JSON document found".to_string()))?;

    let (raw_items, total_items) = match &value {
        Value::Array(items) => (items.clone(), items.len() as u64),
        Value::Object(map) => {
            let items = map
                .get("items")
                .or_else(|| map.get("gateways"))
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    LedgerError::MalformedBody("object carries no items array".to_string())
                })?;
            let total = map
                .get("totalItems")
                .and_then(Value::as_u64)
                .unwrap_or(items.len() as u64);
            (items, total)
        }
        _ => {
            return Err(LedgerError::MalformedBody(
                "listing is neither an array nor an object".to_string(),
            ))
        }
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        match serde_json::from_value::<RawGatewayRecord>(raw) {
            Ok(record) => items.push(record),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unparseable gateway record");
            }
        }
    }

    Ok(GatewayPage { items, total_items })
}

/// Slice the outermost JSON bracket pair out of an HTML-wrapped body.
fn extract_embedded_json(body: &str) -> Option<Value> {
    let start = body.find(|c| c == '[' || c == '{')?;
    let close = if body.as_bytes()[start] == b'[' { ']' } else { '}' };
    let end = body.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}
