use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::price::InstrumentSeries;

/// Aggregate portfolio value over a contiguous calendar window.
///
/// The date axis covers every calendar day in the window (not just trading
/// days), strictly increasing with no duplicates. Values start out as holes
/// (`None`) and are filled by merging per-instrument series and then
/// forward-filling the gaps. Holes that remain after forward-fill (days
/// before any instrument has data) stay `None` and must be rendered as
/// explicit nulls, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValueSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl PortfolioValueSeries {
    /// An all-holes series spanning `start..=end` (both inclusive).
    #[must_use]
    pub fn empty_window(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "window must run forwards");
        let mut dates = Vec::new();
        let mut current = start;
        while current <= end {
            dates.push(current);
            current = match current.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        let values = vec![None; dates.len()];
        Self { dates, values }
    }

    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Add one instrument's contribution: for every calendar date the
    /// instrument has a close for, `close × quantity` is added into that
    /// slot (turning a hole into a value if needed). Dates the instrument
    /// is missing are left untouched, so an absent instrument contributes
    /// nothing rather than zeroing the day.
    ///
    /// Addition is commutative, so merge order never changes the result.
    pub fn merge_instrument(&mut self, series: &InstrumentSeries, quantity: f64) {
        for (slot, date) in self.values.iter_mut().zip(&self.dates) {
            if let Some(close) = series.close_on(*date) {
                *slot = Some(slot.unwrap_or(0.0) + close * quantity);
            }
        }
    }

    /// Carry the last known value forward into subsequent holes. Holes
    /// before the first value are left as holes. Idempotent.
    pub fn forward_fill(&mut self) {
        let mut last_known = None;
        for slot in &mut self.values {
            match *slot {
                Some(value) => last_known = Some(value),
                None => *slot = last_known,
            }
        }
    }

    /// Define every slot as zero. Used when no instrument resolved at all:
    /// the series is flat zero by definition and downstream statistics
    /// report themselves unavailable.
    pub fn fill_zero(&mut self) {
        for slot in &mut self.values {
            *slot = Some(0.0);
        }
    }

    /// Day-over-day returns aligned with the date axis:
    /// `value[t] / value[t-1] - 1` wherever both days carry a value and the
    /// previous value is non-zero; `None` otherwise (including slot 0 and
    /// anything that would divide to an infinity).
    #[must_use]
    pub fn daily_returns(&self) -> Vec<Option<f64>> {
        let mut returns = vec![None; self.values.len()];
        for t in 1..self.values.len() {
            if let (Some(current), Some(previous)) = (self.values[t], self.values[t - 1]) {
                if previous != 0.0 {
                    let r = current / previous - 1.0;
                    if r.is_finite() {
                        returns[t] = Some(r);
                    }
                }
            }
        }
        returns
    }
}

/// Output of one historical aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Merged, forward-filled portfolio value per calendar day.
    pub series: PortfolioValueSeries,

    /// Day-over-day returns aligned with `series`; `None` where undefined.
    pub daily_returns: Vec<Option<f64>>,

    /// Tickers whose history could not be resolved by any source after
    /// retries. Their contribution to the series is a flat zero.
    pub failed_tickers: BTreeSet<String>,
}
