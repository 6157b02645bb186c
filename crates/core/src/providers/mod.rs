pub mod registry;
pub mod retry;
pub mod traits;

// Market-data source implementations
pub mod nse_api;
pub mod yahoo_finance;
