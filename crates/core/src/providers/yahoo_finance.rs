use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use time::OffsetDateTime;

use crate::errors::FetchError;
use crate::models::price::PricePoint;

use super::traits::PriceSource;

/// Yahoo Finance source, used as the fallback behind the NSE bridge.
///
/// - **Free**: no API key required (unofficial public API).
/// - **Coverage**: global equities; NSE listings trade under a ".NS"
///   suffix, which this source appends to bare symbols.
///
/// Uses the `yahoo_finance_api` crate. That crate's error enum is not part
/// of our contract, so every transport failure maps to `Unavailable` and
/// an empty quote set maps to `NotFound`; the registry only needs the
/// retryability of the kind, not the upstream detail.
pub struct YahooFinanceSource {
    connector: yahoo_finance_api::YahooConnector,
    symbol_suffix: String,
}

impl YahooFinanceSource {
    pub fn new(symbol_suffix: impl Into<String>) -> Result<Self, FetchError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| FetchError::Unavailable(format!("Failed to create connector: {e}")))?;
        Ok(Self {
            connector,
            symbol_suffix: symbol_suffix.into(),
        })
    }

    /// Yahoo symbol for an exchange ticker. Symbols already carrying an
    /// exchange suffix are passed through untouched.
    fn qualified(&self, symbol: &str) -> String {
        if symbol.contains('.') || self.symbol_suffix.is_empty() {
            symbol.to_string()
        } else {
            format!("{symbol}{}", self.symbol_suffix)
        }
    }

    /// Convert a `chrono::NaiveDate` to `time::OffsetDateTime` (midnight UTC).
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, FetchError> {
        let month: time::Month = match date.month() {
            1 => time::Month::January,
            2 => time::Month::February,
            3 => time::Month::March,
            4 => time::Month::April,
            5 => time::Month::May,
            6 => time::Month::June,
            7 => time::Month::July,
            8 => time::Month::August,
            9 => time::Month::September,
            10 => time::Month::October,
            11 => time::Month::November,
            12 => time::Month::December,
            _ => unreachable!(),
        };

        let odt = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| FetchError::Unavailable(format!("Invalid date {date}: {e}")))?
            .with_hms(0, 0, 0)
            .map_err(|e| FetchError::Unavailable(format!("Invalid time for {date}: {e}")))?
            .assume_utc();
        Ok(odt)
    }

    /// Convert a unix timestamp (seconds) to `chrono::NaiveDate`.
    fn timestamp_to_naive_date(ts: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }
}

#[async_trait]
impl PriceSource for YahooFinanceSource {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn current_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let yahoo_symbol = self.qualified(symbol);
        let resp = self
            .connector
            .get_latest_quotes(&yahoo_symbol, "1d")
            .await
            .map_err(|e| {
                FetchError::Unavailable(format!("Failed to fetch latest quote for {symbol}: {e}"))
            })?;

        let quote = resp
            .last_quote()
            .map_err(|_| FetchError::NotFound(symbol.to_string()))?;

        Ok(quote.close)
    }

    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let yahoo_symbol = self.qualified(symbol);
        let range_start = Self::to_offset_datetime(start)?;
        let range_end = Self::to_offset_datetime(end + chrono::Duration::days(1))?; // inclusive end

        let resp = self
            .connector
            .get_quote_history(&yahoo_symbol, range_start, range_end)
            .await
            .map_err(|e| {
                FetchError::Unavailable(format!("Failed to fetch history for {symbol}: {e}"))
            })?;

        let quotes = resp.quotes().map_err(|e| {
            FetchError::MalformedResponse(format!("Failed to parse quotes for {symbol}: {e}"))
        })?;

        let points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = Self::timestamp_to_naive_date(q.timestamp)?;
                if date >= start && date <= end {
                    Some(PricePoint {
                        date,
                        close: q.close,
                    })
                } else {
                    None
                }
            })
            .collect();

        Ok(points)
    }
}
