use chrono::NaiveDate;
use tracing::warn;

use crate::errors::FetchError;
use crate::models::price::PricePoint;
use crate::models::settings::Settings;

use super::nse_api::NseApiSource;
use super::retry::{with_backoff, RetryPolicy};
use super::traits::PriceSource;
use super::yahoo_finance::YahooFinanceSource;

/// Ordered collection of price sources with unified retry and fallback.
///
/// Sources are tried in registration order; the first success wins. Every
/// source call is retried per the configured [`RetryPolicy`] before the
/// next source is consulted; when the whole chain is exhausted the last
/// source's error is returned. Prices are validated here (finite,
/// non-negative) so no backend quirk leaks into the aggregation layer.
pub struct PriceSourceRegistry {
    sources: Vec<Box<dyn PriceSource>>,
    retry: RetryPolicy,
}

impl PriceSourceRegistry {
    /// Create an empty registry with the default retry policy.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a registry with the default source chain, in priority order.
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();

        // NSE bridge first: primary, local
        registry.register(Box::new(NseApiSource::new(&settings.market_api_base)));

        // Yahoo Finance as fallback, needs the exchange suffix on bare symbols
        if let Ok(yahoo) = YahooFinanceSource::new(&settings.yahoo_symbol_suffix) {
            registry.register(Box::new(yahoo));
        }

        registry
    }

    /// Replace the retry policy (tests use a zero-delay one).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a source at the end of the priority order.
    pub fn register(&mut self, source: Box<dyn PriceSource>) {
        self.sources.push(source);
    }

    /// Names of all registered sources, in priority order.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Latest traded price for `symbol`, from the first source that
    /// answers with a valid price.
    pub async fn current_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let mut last_error = None;

        for source in &self.sources {
            match with_backoff(self.retry, source.name(), || source.current_price(symbol)).await {
                Ok(price) => {
                    if !price.is_finite() || price < 0.0 {
                        last_error = Some(FetchError::MalformedResponse(format!(
                            "{} returned invalid price {price} for {symbol}",
                            source.name()
                        )));
                        continue;
                    }
                    return Ok(price);
                }
                Err(e) => {
                    warn!(source = source.name(), symbol, error = %e, "price source failed");
                    last_error = Some(e);
                    // Try next source
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FetchError::Unavailable("no price sources registered".to_string())))
    }

    /// Daily closing prices for `symbol` over `start..=end`, from the
    /// first source that has any. A source answering success-with-nothing
    /// is treated as `NotFound` and the next source is consulted. Points
    /// with non-finite or negative closes are dropped before that check.
    pub async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        debug_assert!(start <= end, "history window must run forwards");
        let mut last_error = None;

        for source in &self.sources {
            match with_backoff(self.retry, source.name(), || {
                source.price_history(symbol, start, end)
            })
            .await
            {
                Ok(mut points) => {
                    points.retain(|p| p.close.is_finite() && p.close >= 0.0);
                    if points.is_empty() {
                        last_error = Some(FetchError::NotFound(symbol.to_string()));
                        continue;
                    }
                    return Ok(points);
                }
                Err(e) => {
                    warn!(source = source.name(), symbol, error = %e, "history source failed");
                    last_error = Some(e);
                    // Try next source
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FetchError::Unavailable("no price sources registered".to_string())))
    }
}

impl Default for PriceSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
