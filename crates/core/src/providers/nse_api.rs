use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::errors::FetchError;
use crate::models::price::PricePoint;

use super::traits::PriceSource;

/// Date formats the bridge has been observed to emit.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%b-%Y"];

/// Client for the local NSE market-data bridge (primary source).
///
/// Endpoints:
/// - `GET {base}/equity/{symbol}` → `{ "priceInfo": { "lastPrice": … } }`
/// - `GET {base}/equity/historical/{symbol}?from=…&to=…` → entries of
///   `{ "date": …, "closingPrice": … }`, delivered either as a flat list,
///   a single `{ "data": […] }` envelope, or a list of such envelopes.
pub struct NseApiSource {
    client: Client,
    base_url: String,
}

impl NseApiSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

// ── NSE bridge response types ───────────────────────────────────────

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(rename = "priceInfo")]
    price_info: Option<PriceInfo>,
}

#[derive(Deserialize)]
struct PriceInfo {
    #[serde(rename = "lastPrice")]
    last_price: Option<f64>,
}

#[derive(Deserialize)]
struct HistoryEntry {
    date: String,
    #[serde(rename = "closingPrice")]
    closing_price: f64,
}

#[derive(Deserialize)]
struct HistoryEnvelope {
    data: Vec<HistoryEntry>,
}

/// The bridge emits history in three shapes; accept all of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Entries(Vec<HistoryEntry>),
    Envelope(HistoryEnvelope),
    EnvelopeList(Vec<HistoryEnvelope>),
}

impl HistoryPayload {
    fn into_entries(self) -> Vec<HistoryEntry> {
        match self {
            HistoryPayload::Entries(entries) => entries,
            HistoryPayload::Envelope(envelope) => envelope.data,
            HistoryPayload::EnvelopeList(envelopes) => {
                envelopes.into_iter().flat_map(|e| e.data).collect()
            }
        }
    }
}

/// Parse a raw history payload, tolerating the envelope variants and both
/// observed date formats. The result is sorted by date with duplicate
/// dates collapsed (last observation wins). An unparseable date anywhere
/// rejects the payload as malformed.
pub fn parse_history_payload(raw: &str) -> Result<Vec<PricePoint>, FetchError> {
    let payload: HistoryPayload = serde_json::from_str(raw)
        .map_err(|e| FetchError::MalformedResponse(format!("unrecognized history shape: {e}")))?;
    let mut points = Vec::new();
    for entry in payload.into_entries() {
        let date = parse_bridge_date(&entry.date).ok_or_else(|| {
            FetchError::MalformedResponse(format!("unparseable date '{}'", entry.date))
        })?;
        points.push(PricePoint {
            date,
            close: entry.closing_price,
        });
    }
    points.sort_by_key(|p| p.date);
    points.dedup_by(|current, kept| {
        if current.date == kept.date {
            kept.close = current.close;
            true
        } else {
            false
        }
    });
    Ok(points)
}

fn parse_bridge_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

/// Map an HTTP status onto the failure taxonomy, passing success through.
fn check_status(response: reqwest::Response, symbol: &str) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        Err(FetchError::NotFound(symbol.to_string()))
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(FetchError::RateLimited)
    } else if status.is_server_error() {
        Err(FetchError::Unavailable(format!("bridge returned {status}")))
    } else if !status.is_success() {
        Err(FetchError::Unavailable(format!(
            "unexpected status {status} for {symbol}"
        )))
    } else {
        Ok(response)
    }
}

#[async_trait]
impl PriceSource for NseApiSource {
    fn name(&self) -> &str {
        "NSE bridge"
    }

    async fn current_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let url = format!("{}/equity/{symbol}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(FetchError::from)?;
        let response = check_status(response, symbol)?;
        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedResponse(format!("bad quote for {symbol}: {e}")))?;
        quote
            .price_info
            .and_then(|info| info.last_price)
            .ok_or_else(|| {
                FetchError::MalformedResponse(format!("no priceInfo.lastPrice for {symbol}"))
            })
    }

    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let url = format!("{}/equity/historical/{symbol}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("from", start.to_string()), ("to", end.to_string())])
            .send()
            .await
            .map_err(FetchError::from)?;
        let response = check_status(response, symbol)?;
        let raw = response.text().await.map_err(FetchError::from)?;
        let mut points = parse_history_payload(&raw)?;
        // Bridges occasionally pad responses beyond the asked window.
        points.retain(|p| p.date >= start && p.date <= end);
        Ok(points)
    }
}
