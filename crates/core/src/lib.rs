pub mod advisor;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod providers;
pub mod services;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use advisor::{AdvisorBridge, AdvisorConfig};
use errors::CoreError;
use models::{
    holding::HoldingsTable,
    metrics::{PortfolioMetrics, SectorExposure},
    quote::LiveQuote,
    recommendation::Recommendation,
    risk::RiskProfile,
    series::PerformanceReport,
    settings::Settings,
    snapshot::{PortfolioSnapshot, SnapshotInfo, SnapshotStatus},
};
use providers::registry::PriceSourceRegistry;
use services::{
    analytics_service::AnalyticsService, performance_service::PerformanceService,
    quote_service::QuoteService,
    recommendation_service::{FundamentalsSource, RecommendationService},
};

pub use ingest::{MAX_UPLOAD_BYTES, REQUIRED_COLUMNS};
pub use services::performance_service::MAX_WINDOW_DAYS;

/// Main entry point for the Portfolio Insight core library.
///
/// One session owns one holdings snapshot and the services operating on
/// it. Sessions share nothing mutable, so concurrent sessions can never
/// observe each other's portfolios; derived series and metrics live only
/// as long as the call that produced them.
#[must_use]
pub struct PortfolioSession {
    snapshot: Option<PortfolioSnapshot>,
    settings: Settings,
    registry: Arc<PriceSourceRegistry>,
    quote_service: QuoteService,
    performance_service: PerformanceService,
    analytics_service: AnalyticsService,
    recommendation_service: RecommendationService,
    advisor: Option<AdvisorBridge>,
}

impl std::fmt::Debug for PortfolioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioSession")
            .field("snapshot", &self.snapshot.as_ref().map(PortfolioSnapshot::info))
            .field("settings", &self.settings)
            .field("sources", &self.registry.source_names())
            .field("advisor", &self.advisor.is_some())
            .finish()
    }
}

impl PortfolioSession {
    /// A session with default settings and the default source chain
    /// (NSE bridge first, Yahoo Finance fallback).
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// A session configured from explicit settings.
    pub fn with_settings(settings: Settings) -> Self {
        let registry = Arc::new(PriceSourceRegistry::new_with_defaults(&settings));
        Self::build(settings, registry)
    }

    /// A session running against a caller-supplied source registry.
    /// Used by embedders and tests that bring their own sources.
    pub fn with_registry(settings: Settings, registry: Arc<PriceSourceRegistry>) -> Self {
        Self::build(settings, registry)
    }

    /// Attach a supervised advisor bridge; recommendations gain advice
    /// text from it. Must be called inside a tokio runtime (the
    /// supervisor is spawned immediately).
    pub fn attach_advisor(&mut self, config: AdvisorConfig) {
        self.advisor = Some(AdvisorBridge::spawn(config));
    }

    /// Plug an optional fundamentals capability into recommendations.
    pub fn set_fundamentals_source(&mut self, source: Box<dyn FundamentalsSource>) {
        self.recommendation_service = RecommendationService::with_fundamentals(source);
    }

    /// Session settings as configured.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Upload ──────────────────────────────────────────────────────

    /// Ingest an uploaded spreadsheet, replacing any previous snapshot.
    ///
    /// The snapshot moves `processing → ready` on success and
    /// `processing → failed` on a rejected upload; either outcome stays
    /// queryable through [`Self::status`], including the failure detail.
    pub fn upload_holdings(
        &mut self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<SnapshotInfo, CoreError> {
        let mut snapshot = PortfolioSnapshot::processing(filename);
        match ingest::parse_holdings(bytes, filename) {
            Ok(holdings) => {
                snapshot.mark_ready(holdings);
                let info = snapshot.info();
                self.snapshot = Some(snapshot);
                Ok(info)
            }
            Err(err) => {
                warn!(filename, error = %err, "holdings upload rejected");
                snapshot.mark_failed(err.to_string());
                self.snapshot = Some(snapshot);
                Err(err)
            }
        }
    }

    /// Read a spreadsheet from disk and ingest it. The size cap applies
    /// before the file is read.
    pub fn upload_holdings_file(&mut self, path: &Path) -> Result<SnapshotInfo, CoreError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        match read_upload(path) {
            Ok(bytes) => self.upload_holdings(&bytes, &filename),
            Err(err) => {
                warn!(filename = %filename, error = %err, "holdings file rejected");
                let mut snapshot = PortfolioSnapshot::processing(filename);
                snapshot.mark_failed(err.to_string());
                self.snapshot = Some(snapshot);
                Err(err)
            }
        }
    }

    /// Status of the current snapshot, or `None` when nothing was ever
    /// uploaded. Works for failed uploads too.
    #[must_use]
    pub fn status(&self) -> Option<SnapshotInfo> {
        self.snapshot.as_ref().map(PortfolioSnapshot::info)
    }

    /// Drop the current snapshot, if any.
    pub fn clear_portfolio(&mut self) {
        self.snapshot = None;
    }

    /// The ready holdings table. `NoPortfolio` when nothing was uploaded
    /// or the last upload failed.
    pub fn holdings(&self) -> Result<&HoldingsTable, CoreError> {
        match &self.snapshot {
            Some(snapshot) if snapshot.status == SnapshotStatus::Ready => Ok(&snapshot.holdings),
            _ => Err(CoreError::NoPortfolio),
        }
    }

    // ── Live data ───────────────────────────────────────────────────

    /// Live quotes for every holding, in upload order. Symbols every
    /// source failed to price carry an explicit error marker.
    pub async fn live_prices(&self) -> Result<Vec<LiveQuote>, CoreError> {
        let holdings = self.holdings()?;
        Ok(self.quote_service.live_quotes(&self.registry, holdings).await)
    }

    /// Valuation and P/L dashboard for the current snapshot.
    pub async fn dashboard(&self) -> Result<PortfolioMetrics, CoreError> {
        let holdings = self.holdings()?;
        let quotes = self.quote_service.live_quotes(&self.registry, holdings).await;
        Ok(self.analytics_service.portfolio_metrics(holdings, &quotes))
    }

    /// Current value grouped by sector, largest first.
    pub async fn sector_analysis(&self) -> Result<Vec<SectorExposure>, CoreError> {
        let holdings = self.holdings()?;
        let quotes = self.quote_service.live_quotes(&self.registry, holdings).await;
        Ok(self.analytics_service.sector_analysis(holdings, &quotes))
    }

    // ── History & Risk ──────────────────────────────────────────────

    /// Portfolio-value series over the trailing `days`-day window,
    /// including day-over-day returns and the set of unresolvable
    /// tickers.
    pub async fn historical_performance(&self, days: i64) -> Result<PerformanceReport, CoreError> {
        let holdings = self.holdings()?;
        self.performance_service
            .portfolio_history(&self.registry, holdings, days)
            .await
    }

    /// Risk profile over the trailing `days`-day window.
    pub async fn risk_profile(&self, days: i64) -> Result<RiskProfile, CoreError> {
        let holdings = self.holdings()?;
        let report = self
            .performance_service
            .portfolio_history(&self.registry, holdings, days)
            .await?;
        let quotes = self.quote_service.live_quotes(&self.registry, holdings).await;
        Ok(self.analytics_service.risk_profile(&report, holdings, &quotes))
    }

    // ── Recommendations ─────────────────────────────────────────────

    /// P/L-band recommendation per holding, with advisor commentary when
    /// a bridge is attached. Advisor failures only cost the commentary.
    pub async fn recommendations(&self) -> Result<Vec<Recommendation>, CoreError> {
        let holdings = self.holdings()?;
        let quotes = self.quote_service.live_quotes(&self.registry, holdings).await;
        let mut recommendations = self
            .recommendation_service
            .recommendations(holdings, &quotes)
            .await;

        if let Some(advisor) = &self.advisor {
            for recommendation in &mut recommendations {
                match advisor
                    .advise(&recommendation.ticker, recommendation.pl_percent)
                    .await
                {
                    Ok(advice) => recommendation.advice = Some(advice),
                    Err(err) => {
                        debug!(ticker = %recommendation.ticker, error = %err, "no advisor commentary");
                    }
                }
            }
        }
        Ok(recommendations)
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(settings: Settings, registry: Arc<PriceSourceRegistry>) -> Self {
        let quote_service = QuoteService::with_max_parallel(settings.max_parallel_fetches);
        let performance_service = PerformanceService::with_limits(
            settings.max_parallel_fetches,
            Duration::from_secs(settings.fetch_budget_secs),
        );
        Self {
            snapshot: None,
            settings,
            registry,
            quote_service,
            performance_service,
            analytics_service: AnalyticsService::new(),
            recommendation_service: RecommendationService::new(),
            advisor: None,
        }
    }
}

impl Default for PortfolioSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an upload from disk, enforcing the size cap before reading.
fn read_upload(path: &Path) -> Result<Vec<u8>, CoreError> {
    let metadata = std::fs::metadata(path)?;
    ingest::check_upload_size(metadata.len() as usize)?;
    Ok(std::fs::read(path)?)
}
