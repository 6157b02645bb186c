use serde::{Deserialize, Serialize};

/// Point-in-time valuation and P/L for a single holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingMetrics {
    /// Exchange symbol
    pub ticker: String,

    /// Sector label from the upload, if any
    pub sector: Option<String>,

    /// Units held
    pub quantity: f64,

    /// Average acquisition price per unit
    pub average_price: f64,

    /// Live traded price, when a quote was available
    pub live_price: Option<f64>,

    /// Price used for valuation: the live price when available, otherwise
    /// the previous close carried in the upload
    pub current_price: f64,

    /// Cost basis: quantity × average_price
    pub investment: f64,

    /// quantity × current_price
    pub current_value: f64,

    /// current_value − investment
    pub pl: f64,

    /// pl / investment × 100; `None` when nothing was invested
    pub pl_percent: Option<f64>,

    /// Share of total portfolio value, in percent (0 when the total is 0)
    pub allocation_pct: f64,
}

/// One row of the top/bottom performer tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformerEntry {
    pub ticker: String,
    pub pl_percent: f64,
}

/// Whole-portfolio valuation metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Sum of cost bases
    pub total_investment: f64,

    /// Sum of current values
    pub total_value: f64,

    /// total_value − total_investment
    pub total_pl: f64,

    /// total_pl / total_investment × 100 (0 when nothing is invested)
    pub pl_percent: f64,

    /// Holdings with strictly positive P/L
    pub profitable_count: usize,

    /// Holdings with strictly negative P/L
    pub losing_count: usize,

    /// Up to three best performers by P/L percent. Upload order breaks
    /// ties; rows with no cost basis are not ranked.
    pub top_performers: Vec<PerformerEntry>,

    /// Up to three worst performers by P/L percent
    pub bottom_performers: Vec<PerformerEntry>,

    /// Per-holding breakdown, in upload order
    pub holdings: Vec<HoldingMetrics>,
}

/// Aggregate current value held in one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorExposure {
    pub sector: String,
    pub current_value: f64,
}
