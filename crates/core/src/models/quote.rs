use serde::{Deserialize, Serialize};

/// A live quote row for one holding, or an explicit marker of why it is
/// missing. Partial data is never rendered as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    /// Exchange symbol
    pub ticker: String,

    /// Last traded price; `None` when every source failed
    pub last_price: Option<f64>,

    /// Absolute change vs the uploaded previous close
    pub change: Option<f64>,

    /// Percent change vs the uploaded previous close; `None` when the
    /// previous close was zero
    pub change_percent: Option<f64>,

    /// Why the quote is missing, for display; `None` on success
    pub error: Option<String>,
}

impl LiveQuote {
    /// A successfully priced row, with change fields derived against the
    /// uploaded previous close.
    #[must_use]
    pub fn priced(ticker: impl Into<String>, last_price: f64, previous_close: f64) -> Self {
        let change = last_price - previous_close;
        let change_percent = if previous_close != 0.0 {
            Some(change / previous_close * 100.0)
        } else {
            None
        };
        Self {
            ticker: ticker.into(),
            last_price: Some(last_price),
            change: Some(change),
            change_percent,
            error: None,
        }
    }

    /// A row every source failed to price, carrying the failure text.
    #[must_use]
    pub fn failed(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            last_price: None,
            change: None,
            change_percent: None,
            error: Some(reason.into()),
        }
    }
}
