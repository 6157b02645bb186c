use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single closing-price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// One instrument's price history over a requested window.
///
/// Fetched fresh for every aggregation pass and discarded with it; nothing
/// here outlives the computation that requested it. Gaps (non-trading
/// days, missing upstream data) are expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSeries {
    pub ticker: String,
    /// Sorted by date, at most one point per date.
    points: Vec<PricePoint>,
}

impl InstrumentSeries {
    /// Build a series from raw points: sorts by date and collapses
    /// duplicate dates, keeping the last observation for each.
    #[must_use]
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by(|current, kept| {
            if current.date == kept.date {
                kept.close = current.close;
                true
            } else {
                false
            }
        });
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    #[must_use]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closing price on an exact date, if observed.
    /// Uses binary search on the sorted points (O(log n)).
    #[must_use]
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].close)
    }
}
