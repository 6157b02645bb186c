use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::FetchError;
use crate::models::holding::HoldingsTable;
use crate::models::quote::LiveQuote;
use crate::models::recommendation::{classify, Action, Fundamentals, Recommendation, REASON_NO_SIGNAL};

/// Optional capability supplying fundamentals (PE, EPS, market cap) for a
/// symbol. Purely decorative for recommendations: the P/L band rule is
/// the contract and never depends on this data.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals, FetchError>;
}

/// Derives per-holding signals from the P/L band rule, optionally
/// decorated with fundamentals data.
pub struct RecommendationService {
    fundamentals: Option<Box<dyn FundamentalsSource>>,
}

impl RecommendationService {
    pub fn new() -> Self {
        Self { fundamentals: None }
    }

    #[must_use]
    pub fn with_fundamentals(source: Box<dyn FundamentalsSource>) -> Self {
        Self {
            fundamentals: Some(source),
        }
    }

    /// One recommendation per holding, in upload order.
    ///
    /// The P/L percent is computed against the live price when available,
    /// the uploaded previous close otherwise. A row with no cost basis
    /// has no P/L percent and maps to Hold with no signal.
    pub async fn recommendations(
        &self,
        holdings: &HoldingsTable,
        quotes: &[LiveQuote],
    ) -> Vec<Recommendation> {
        let live: HashMap<&str, f64> = quotes
            .iter()
            .filter_map(|q| q.last_price.map(|price| (q.ticker.as_str(), price)))
            .collect();

        let mut recommendations = Vec::with_capacity(holdings.len());
        for holding in &holdings.rows {
            let current_price = live
                .get(holding.ticker.as_str())
                .copied()
                .unwrap_or(holding.previous_close);
            let investment = holding.investment();
            let pl_percent = if investment > 0.0 {
                Some((holding.quantity * current_price - investment) / investment * 100.0)
            } else {
                None
            };

            let (action, reason) = match pl_percent {
                Some(p) => classify(p),
                None => (Action::Hold, REASON_NO_SIGNAL),
            };

            let fundamentals = match &self.fundamentals {
                Some(source) => match source.fundamentals(&holding.ticker).await {
                    Ok(data) => Some(data),
                    Err(err) => {
                        debug!(ticker = %holding.ticker, error = %err, "fundamentals unavailable");
                        None
                    }
                },
                None => None,
            };

            recommendations.push(Recommendation {
                ticker: holding.ticker.clone(),
                pl_percent,
                action,
                reason: reason.to_string(),
                fundamentals,
                advice: None,
            });
        }
        recommendations
    }
}

impl Default for RecommendationService {
    fn default() -> Self {
        Self::new()
    }
}
