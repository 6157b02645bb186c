use serde::{Deserialize, Serialize};

/// Risk statistics derived from an aggregated portfolio-value series plus
/// the sector composition of the holdings.
///
/// Every field is independently `None` ("unavailable") when it cannot be
/// computed; zero is reserved for genuinely computed values. The whole
/// profile is unset when the series carries fewer than two valid points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Annualized standard deviation of daily returns, in percent.
    pub volatility: Option<f64>,

    /// Worst decline from a running peak, in percent. Always <= 0 when set.
    pub max_drawdown: Option<f64>,

    /// Sector holding the largest share of current value.
    pub top_sector: Option<String>,

    /// Share of current value held in `top_sector`, in percent.
    pub top_sector_exposure_pct: Option<f64>,

    /// Herfindahl-style sum of squared percent shares (percent² scale).
    /// A single-sector portfolio scores exactly 10000.
    pub sector_concentration_index: Option<f64>,

    /// Number of distinct sectors; blank sectors count once as "Unknown".
    pub num_sectors: Option<usize>,
}

impl RiskProfile {
    /// The fully-unset profile, reported whenever fewer than two valid
    /// data points exist.
    #[must_use]
    pub fn unset() -> Self {
        Self::default()
    }

    /// True when no statistic could be computed.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.volatility.is_none()
            && self.max_drawdown.is_none()
            && self.top_sector.is_none()
            && self.top_sector_exposure_pct.is_none()
            && self.sector_concentration_index.is_none()
            && self.num_sectors.is_none()
    }
}
