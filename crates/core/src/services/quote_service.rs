use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::models::holding::HoldingsTable;
use crate::models::quote::LiveQuote;
use crate::models::settings::DEFAULT_MAX_PARALLEL_FETCHES;
use crate::providers::registry::PriceSourceRegistry;

/// Fetches live quotes for every holding with bounded parallelism.
///
/// Quote failures never abort the batch: a symbol every source failed to
/// price still yields a [`LiveQuote`] row, carrying the failure text
/// instead of a price. Rows come back in upload order.
pub struct QuoteService {
    max_parallel: usize,
}

impl QuoteService {
    pub fn new() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL_FETCHES,
        }
    }

    #[must_use]
    pub fn with_max_parallel(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    /// One quote per holding, in upload order. Duplicate tickers are
    /// quoted per row.
    pub async fn live_quotes(
        &self,
        registry: &PriceSourceRegistry,
        holdings: &HoldingsTable,
    ) -> Vec<LiveQuote> {
        let semaphore = Semaphore::new(self.max_parallel);

        let fetches = holdings.rows.iter().map(|holding| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok();
                registry.current_price(&holding.ticker).await
            }
        });

        join_all(fetches)
            .await
            .into_iter()
            .zip(&holdings.rows)
            .map(|(outcome, holding)| match outcome {
                Ok(price) => LiveQuote::priced(&holding.ticker, price, holding.previous_close),
                Err(err) => {
                    warn!(ticker = %holding.ticker, error = %err, "live quote unavailable");
                    LiveQuote::failed(&holding.ticker, err.to_string())
                }
            })
            .collect()
    }
}

impl Default for QuoteService {
    fn default() -> Self {
        Self::new()
    }
}
