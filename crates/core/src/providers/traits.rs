use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::FetchError;
use crate::models::price::PricePoint;

/// Capability abstraction over one external market-data source.
///
/// Implementations wrap a concrete backend (the local NSE bridge, Yahoo
/// Finance). Callers never talk to a source directly; the
/// [`PriceSourceRegistry`](super::registry::PriceSourceRegistry) tries its
/// sources in priority order so retry and fallback logic lives in exactly
/// one place.
///
/// Contract for both calls: `symbol` is non-empty; failures are reported
/// through [`FetchError`], whose kind decides retryability.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Human-readable source name, used in logs and error markers.
    fn name(&self) -> &str;

    /// Latest traded price for a symbol.
    async fn current_price(&self, symbol: &str) -> Result<f64, FetchError>;

    /// Daily closing prices over `start..=end` (both inclusive, start <=
    /// end, window capped by the caller). Gaps are expected and allowed;
    /// an empty result means the source knows nothing about the window.
    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError>;
}
