use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::errors::{CoreError, FetchError};
use crate::models::holding::HoldingsTable;
use crate::models::price::{InstrumentSeries, PricePoint};
use crate::models::series::{PerformanceReport, PortfolioValueSeries};
use crate::models::settings::{DEFAULT_FETCH_BUDGET_SECS, DEFAULT_MAX_PARALLEL_FETCHES};
use crate::providers::registry::PriceSourceRegistry;

/// Maximum trailing window for historical views, in days (10 years).
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Builds the portfolio-value time series for a holdings table.
///
/// Per-instrument histories are fetched concurrently (bounded by a
/// semaphore), aligned onto a shared calendar, scaled by held quantity,
/// and summed. The sum is commutative, so the result never depends on
/// completion order. A ticker failing every source degrades to a flat
/// zero contribution and is reported in the result; it is never an error.
pub struct PerformanceService {
    max_parallel: usize,
    fetch_budget: Duration,
}

impl PerformanceService {
    pub fn new() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL_FETCHES,
            fetch_budget: Duration::from_secs(DEFAULT_FETCH_BUDGET_SECS),
        }
    }

    #[must_use]
    pub fn with_limits(max_parallel: usize, fetch_budget: Duration) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            fetch_budget,
        }
    }

    /// Aggregate over the trailing `days`-day window ending today.
    pub async fn portfolio_history(
        &self,
        registry: &Arc<PriceSourceRegistry>,
        holdings: &HoldingsTable,
        days: i64,
    ) -> Result<PerformanceReport, CoreError> {
        self.portfolio_history_as_of(registry, holdings, days, Utc::now().date_naive())
            .await
    }

    /// Aggregate over `end − days ..= end`. Split out from
    /// [`Self::portfolio_history`] so callers and tests can pin the
    /// calendar to a fixed end date.
    ///
    /// Steps:
    /// 1. Validate `days` against \[1, [`MAX_WINDOW_DAYS`]\].
    /// 2. Build the calendar (every day in the window, `days + 1` dates).
    /// 3. Spawn one bounded fetch task per holding with quantity > 0.
    /// 4. Merge each resolved history into the series (close × quantity,
    ///    position-wise add); record failures instead of propagating them.
    /// 5. Forward-fill gaps, or define the series as all-zero when nothing
    ///    resolved at all.
    /// 6. Derive day-over-day returns.
    pub async fn portfolio_history_as_of(
        &self,
        registry: &Arc<PriceSourceRegistry>,
        holdings: &HoldingsTable,
        days: i64,
        end: NaiveDate,
    ) -> Result<PerformanceReport, CoreError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            return Err(CoreError::ValidationError(format!(
                "Invalid 'days' parameter. Must be an integer between 1 and {MAX_WINDOW_DAYS}."
            )));
        }
        let start = end - chrono::Duration::days(days);
        let mut series = PortfolioValueSeries::empty_window(start, end);

        // One bounded fetch task per holding that can contribute value.
        // The pending map keeps per-ticker spawn counts so tasks lost to
        // the budget (or a panic) still end up in the failed set.
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks: JoinSet<(String, f64, Result<Vec<PricePoint>, FetchError>)> = JoinSet::new();
        let mut pending: HashMap<String, usize> = HashMap::new();

        for holding in holdings.rows.iter().filter(|h| h.quantity > 0.0) {
            let registry = Arc::clone(registry);
            let semaphore = Arc::clone(&semaphore);
            let ticker = holding.ticker.clone();
            let quantity = holding.quantity;
            *pending.entry(ticker.clone()).or_insert(0) += 1;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = registry.price_history(&ticker, start, end).await;
                (ticker, quantity, outcome)
            });
        }

        let mut failed: BTreeSet<String> = BTreeSet::new();
        let mut resolved = 0usize;
        let mut budget_exhausted = false;
        let deadline = Instant::now() + self.fetch_budget;

        loop {
            let joined = if budget_exhausted {
                // Drain whatever finished before the abort landed.
                match tasks.join_next().await {
                    Some(joined) => joined,
                    None => break,
                }
            } else {
                match timeout_at(deadline, tasks.join_next()).await {
                    Ok(Some(joined)) => joined,
                    Ok(None) => break,
                    Err(_) => {
                        // Budget exhausted. Abort what is left; aborted
                        // tasks stay in the pending map and count as
                        // failed. Late completions die with the
                        // invocation-scoped task set, so they can never
                        // leak into another pass.
                        warn!(
                            remaining = pending.values().sum::<usize>(),
                            "fetch budget exhausted; abandoning outstanding fetches"
                        );
                        tasks.abort_all();
                        budget_exhausted = true;
                        continue;
                    }
                }
            };

            match joined {
                Ok((ticker, quantity, Ok(points))) => {
                    settle(&mut pending, &ticker);
                    if points.is_empty() {
                        failed.insert(ticker);
                        continue;
                    }
                    let instrument = InstrumentSeries::new(ticker, points);
                    series.merge_instrument(&instrument, quantity);
                    resolved += 1;
                }
                Ok((ticker, _quantity, Err(err))) => {
                    settle(&mut pending, &ticker);
                    warn!(ticker = %ticker, error = %err, "history unresolved after retries");
                    failed.insert(ticker);
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    error!(error = %join_err, "history fetch task panicked");
                }
            }
        }
        failed.extend(pending.into_keys());

        if resolved == 0 {
            // Nothing resolvable: the series is flat zero by definition
            // and downstream risk statistics report unavailable.
            series.fill_zero();
        } else {
            series.forward_fill();
        }

        let daily_returns = series.daily_returns();
        info!(
            days,
            resolved,
            failed = failed.len(),
            "portfolio history aggregated"
        );
        Ok(PerformanceReport {
            series,
            daily_returns,
            failed_tickers: failed,
        })
    }
}

impl Default for PerformanceService {
    fn default() -> Self {
        Self::new()
    }
}

/// Mark one spawned fetch for `ticker` as accounted for.
fn settle(pending: &mut HashMap<String, usize>, ticker: &str) {
    if let Some(count) = pending.get_mut(ticker) {
        *count -= 1;
        if *count == 0 {
            pending.remove(ticker);
        }
    }
}
