use std::collections::{BTreeMap, HashMap};

use crate::models::holding::HoldingsTable;
use crate::models::metrics::{HoldingMetrics, PerformerEntry, PortfolioMetrics, SectorExposure};
use crate::models::quote::LiveQuote;
use crate::models::risk::RiskProfile;
use crate::models::series::PerformanceReport;

/// Trading days per year, the annualization factor for volatility.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// How many rows the top/bottom performer tables carry.
const PERFORMER_TABLE_SIZE: usize = 3;

/// Computes portfolio analytics: valuation and P/L metrics, sector
/// exposure, and the risk profile derived from an aggregated series.
///
/// Everything here is synchronous computation over already-fetched data;
/// the quote slice comes from
/// [`QuoteService`](super::quote_service::QuoteService) and the report
/// from [`PerformanceService`](super::performance_service::PerformanceService).
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    /// Point-in-time valuation for every holding plus portfolio totals.
    ///
    /// Per row the live price is preferred for the current value; when no
    /// quote resolved, the previous close from the upload stands in.
    #[must_use]
    pub fn portfolio_metrics(
        &self,
        holdings: &HoldingsTable,
        quotes: &[LiveQuote],
    ) -> PortfolioMetrics {
        let live = live_price_map(quotes);

        // 1. Value each row
        let mut rows = Vec::with_capacity(holdings.len());
        let mut total_investment = 0.0;
        let mut total_value = 0.0;

        for holding in &holdings.rows {
            let live_price = live.get(holding.ticker.as_str()).copied();
            let current_price = live_price.unwrap_or(holding.previous_close);
            let investment = holding.investment();
            let current_value = holding.quantity * current_price;
            let pl = current_value - investment;
            let pl_percent = if investment > 0.0 {
                Some(pl / investment * 100.0)
            } else {
                None
            };

            total_investment += investment;
            total_value += current_value;

            rows.push(HoldingMetrics {
                ticker: holding.ticker.clone(),
                sector: holding.sector.clone(),
                quantity: holding.quantity,
                average_price: holding.average_price,
                live_price,
                current_price,
                investment,
                current_value,
                pl,
                pl_percent,
                allocation_pct: 0.0, // filled below
            });
        }

        // 2. Allocation needs the final total
        for row in &mut rows {
            row.allocation_pct = if total_value > 0.0 {
                (row.current_value / total_value) * 100.0
            } else {
                0.0
            };
        }

        // 3. Aggregates
        let total_pl = total_value - total_investment;
        let pl_percent = if total_investment > 0.0 {
            (total_pl / total_investment) * 100.0
        } else {
            0.0
        };
        let profitable_count = rows.iter().filter(|r| r.pl > 0.0).count();
        let losing_count = rows.iter().filter(|r| r.pl < 0.0).count();

        // 4. Rank by P/L percent; upload order breaks ties and rows with
        // no cost basis are left out.
        let mut ranked: Vec<(usize, f64)> = rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| row.pl_percent.map(|p| (idx, p)))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let top_performers = performer_entries(&ranked, &rows);

        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let bottom_performers = performer_entries(&ranked, &rows);

        PortfolioMetrics {
            total_investment,
            total_value,
            total_pl,
            pl_percent,
            profitable_count,
            losing_count,
            top_performers,
            bottom_performers,
            holdings: rows,
        }
    }

    /// Current value grouped by sector, largest first. Rows without a
    /// sector fall into the "Unknown" bucket; an empty table yields an
    /// empty sequence.
    #[must_use]
    pub fn sector_analysis(
        &self,
        holdings: &HoldingsTable,
        quotes: &[LiveQuote],
    ) -> Vec<SectorExposure> {
        let live = live_price_map(quotes);

        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for holding in &holdings.rows {
            let current_price = live
                .get(holding.ticker.as_str())
                .copied()
                .unwrap_or(holding.previous_close);
            *totals.entry(holding.sector_label()).or_insert(0.0) +=
                holding.quantity * current_price;
        }

        let mut exposures: Vec<SectorExposure> = totals
            .into_iter()
            .map(|(sector, current_value)| SectorExposure {
                sector: sector.to_string(),
                current_value,
            })
            .collect();

        // Largest exposure first; the alphabetical grouping order above
        // keeps ties deterministic under the stable sort.
        exposures.sort_by(|a, b| {
            b.current_value
                .partial_cmp(&a.current_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        exposures
    }

    /// Risk profile from an aggregation report plus the sector composition
    /// of the holdings.
    ///
    /// Needs at least two dates carrying a value; below that the whole
    /// profile reports unavailable rather than zero. Individual fields
    /// also go unset on their own: volatility when fewer than two valid
    /// returns exist, drawdown when no positive peak was ever seen.
    #[must_use]
    pub fn risk_profile(
        &self,
        report: &PerformanceReport,
        holdings: &HoldingsTable,
        quotes: &[LiveQuote],
    ) -> RiskProfile {
        let values: Vec<f64> = report.series.values().iter().flatten().copied().collect();
        if values.len() < 2 {
            return RiskProfile::unset();
        }

        // 1. Volatility: sample stddev of daily returns, annualized, percent
        let returns: Vec<f64> = report.daily_returns.iter().flatten().copied().collect();
        let volatility = if returns.len() >= 2 {
            let mean = returns.iter().sum::<f64>() / returns.len() as f64;
            let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
                / (returns.len() - 1) as f64;
            Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0)
        } else {
            None
        };

        // 2. Max drawdown: worst decline from the running peak, <= 0.
        // Days before the peak first leaves zero carry no drawdown.
        let mut peak = f64::NEG_INFINITY;
        let mut max_drawdown: Option<f64> = None;
        for value in &values {
            if *value > peak {
                peak = *value;
            }
            if peak > 0.0 {
                let drawdown = (value - peak) / peak * 100.0;
                max_drawdown = Some(match max_drawdown {
                    Some(worst) => worst.min(drawdown),
                    None => drawdown,
                });
            }
        }

        // 3. Sector concentration over current values
        let exposures = self.sector_analysis(holdings, quotes);
        let total: f64 = exposures.iter().map(|e| e.current_value).sum();
        let (top_sector, top_sector_exposure_pct, sector_concentration_index) =
            if exposures.is_empty() || total <= 0.0 {
                (None, None, None)
            } else {
                // Percent shares; squared sum is the percent² Herfindahl
                // scale, 10000 for a single sector.
                let concentration = exposures
                    .iter()
                    .map(|e| {
                        let share_pct = e.current_value / total * 100.0;
                        share_pct * share_pct
                    })
                    .sum::<f64>();
                let top = &exposures[0];
                (
                    Some(top.sector.clone()),
                    Some(top.current_value / total * 100.0),
                    Some(concentration),
                )
            };
        let num_sectors = if exposures.is_empty() {
            None
        } else {
            Some(exposures.len())
        };

        RiskProfile {
            volatility,
            max_drawdown,
            top_sector,
            top_sector_exposure_pct,
            sector_concentration_index,
            num_sectors,
        }
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved live prices by ticker. Duplicate rows for one ticker share the
/// same live price, so last-in wins harmlessly.
fn live_price_map(quotes: &[LiveQuote]) -> HashMap<&str, f64> {
    quotes
        .iter()
        .filter_map(|q| q.last_price.map(|price| (q.ticker.as_str(), price)))
        .collect()
}

fn performer_entries(ranked: &[(usize, f64)], rows: &[HoldingMetrics]) -> Vec<PerformerEntry> {
    ranked
        .iter()
        .take(PERFORMER_TABLE_SIZE)
        .map(|&(idx, pl_percent)| PerformerEntry {
            ticker: rows[idx].ticker.clone(),
            pl_percent,
        })
        .collect()
}
