use serde::{Deserialize, Serialize};

/// Reason attached to a "Buy More" signal.
pub const REASON_DOWN: &str = "Stock is down significantly.";
/// Reason attached to a "Sell" signal.
pub const REASON_UP: &str = "Stock is up significantly.";
/// Reason attached to a "Hold" on a small loss.
pub const REASON_TEMP_LOSS: &str = "Temporary loss, but no strong sell signal.";
/// Reason attached to a "Hold" with no signal either way.
pub const REASON_NO_SIGNAL: &str = "No strong buy/sell signal.";

/// The action side of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "Buy More")]
    BuyMore,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::BuyMore => write!(f, "Buy More"),
            Action::Sell => write!(f, "Sell"),
            Action::Hold => write!(f, "Hold"),
        }
    }
}

/// Map a P/L percentage onto the action bands. First matching band wins;
/// the bands cover the whole line, so exactly one always matches.
///
/// | P/L percent        | action   |
/// |--------------------|----------|
/// | below −10          | Buy More |
/// | above 20           | Sell     |
/// | −10 up to below 0  | Hold     |
/// | 0 up to 20         | Hold     |
#[must_use]
pub fn classify(pl_percent: f64) -> (Action, &'static str) {
    if pl_percent < -10.0 {
        (Action::BuyMore, REASON_DOWN)
    } else if pl_percent > 20.0 {
        (Action::Sell, REASON_UP)
    } else if pl_percent < 0.0 {
        (Action::Hold, REASON_TEMP_LOSS)
    } else {
        (Action::Hold, REASON_NO_SIGNAL)
    }
}

/// Fundamentals snapshot from an optional data capability. All fields are
/// best-effort; absence never changes the recommended action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Rule-based signal for one holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Exchange symbol
    pub ticker: String,

    /// P/L percent the rule was applied to; `None` for a zero cost basis
    pub pl_percent: Option<f64>,

    /// Recommended action from the P/L band rule
    pub action: Action,

    /// Contracted reason string for the selected band
    pub reason: String,

    /// Optional secondary signal from a fundamentals source
    pub fundamentals: Option<Fundamentals>,

    /// Optional free-text commentary from the advisor bridge
    pub advice: Option<String>,
}
