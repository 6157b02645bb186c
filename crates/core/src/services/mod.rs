pub mod analytics_service;
pub mod performance_service;
pub mod quote_service;
pub mod recommendation_service;
