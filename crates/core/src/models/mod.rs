pub mod holding;
pub mod metrics;
pub mod price;
pub mod quote;
pub mod recommendation;
pub mod risk;
pub mod series;
pub mod settings;
pub mod snapshot;
