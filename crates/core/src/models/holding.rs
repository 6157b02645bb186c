use serde::{Deserialize, Serialize};

/// Label under which holdings with no sector information are grouped.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// A single portfolio line item as parsed from an uploaded spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Exchange symbol, uppercased (e.g., "RELIANCE", "TCS"). Never empty.
    pub ticker: String,

    /// Sector label from the upload; `None` when the column was absent
    /// or the cell was blank.
    pub sector: Option<String>,

    /// Units held. Non-negative; zero-quantity rows are kept but carry
    /// no value and are skipped by the history aggregator.
    pub quantity: f64,

    /// Average acquisition price per unit. Strictly positive.
    pub average_price: f64,

    /// Previous session's closing price from the upload. Stands in for
    /// the current price whenever no live quote is available.
    pub previous_close: f64,
}

impl Holding {
    pub fn new(
        ticker: impl Into<String>,
        sector: Option<&str>,
        quantity: f64,
        average_price: f64,
        previous_close: f64,
    ) -> Self {
        Self {
            ticker: ticker.into().trim().to_uppercase(),
            sector: sector
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            quantity,
            average_price,
            previous_close,
        }
    }

    /// Cost basis: quantity × average price.
    #[must_use]
    pub fn investment(&self) -> f64 {
        self.quantity * self.average_price
    }

    /// Sector label with blanks collapsed into the "Unknown" bucket.
    #[must_use]
    pub fn sector_label(&self) -> &str {
        self.sector.as_deref().unwrap_or(UNKNOWN_SECTOR)
    }
}

/// Normalized in-memory view of an uploaded portfolio: one row per line
/// item, in upload order. Rows with the same ticker stay separate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldingsTable {
    pub rows: Vec<Holding>,
}

impl HoldingsTable {
    #[must_use]
    pub fn new(rows: Vec<Holding>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of cost bases across all rows.
    #[must_use]
    pub fn total_investment(&self) -> f64 {
        self.rows.iter().map(Holding::investment).sum()
    }
}
