use serde::{Deserialize, Serialize};

/// Default base URL of the local market-data bridge.
pub const DEFAULT_MARKET_API_BASE: &str = "http://localhost:3000/api";

/// Default bound on concurrent per-ticker fetches.
pub const DEFAULT_MAX_PARALLEL_FETCHES: usize = 3;

/// Default wall-clock budget for one aggregation pass, in seconds.
pub const DEFAULT_FETCH_BUDGET_SECS: u64 = 60;

/// Session-level configuration. Serializable so host applications can
/// persist it alongside their own state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the primary market-data bridge (e.g., "http://localhost:3000/api").
    pub market_api_base: String,

    /// Suffix appended to bare tickers for the Yahoo fallback source.
    /// NSE listings trade as "SYMBOL.NS" there.
    pub yahoo_symbol_suffix: String,

    /// Upper bound on concurrent per-ticker fetches (history and quotes).
    pub max_parallel_fetches: usize,

    /// Wall-clock budget for one aggregation pass, in seconds. Fetches
    /// still pending when it expires count as failed for that pass.
    pub fetch_budget_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            market_api_base: DEFAULT_MARKET_API_BASE.to_string(),
            yahoo_symbol_suffix: ".NS".to_string(),
            max_parallel_fetches: DEFAULT_MAX_PARALLEL_FETCHES,
            fetch_budget_secs: DEFAULT_FETCH_BUDGET_SECS,
        }
    }
}
