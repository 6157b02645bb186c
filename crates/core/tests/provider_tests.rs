// ═══════════════════════════════════════════════════════════════════
// Provider Tests: retry policy, NSE bridge payload parsing, registry
// fallback and price validation
// ═══════════════════════════════════════════════════════════════════

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use portfolio_insight_core::errors::FetchError;
use portfolio_insight_core::models::price::PricePoint;
use portfolio_insight_core::providers::nse_api::parse_history_payload;
use portfolio_insight_core::providers::registry::PriceSourceRegistry;
use portfolio_insight_core::providers::retry::{with_backoff, RetryPolicy};
use portfolio_insight_core::providers::traits::PriceSource;

fn make_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// Mock sources
// ═══════════════════════════════════════════════════════════════════

/// Answers every call with fixed data, counting calls.
struct FixedSource {
    source_name: &'static str,
    price: f64,
    history: Vec<PricePoint>,
    calls: Arc<AtomicU32>,
}

impl FixedSource {
    fn new(source_name: &'static str, price: f64, calls: &Arc<AtomicU32>) -> Box<Self> {
        Box::new(Self {
            source_name,
            price,
            history: vec![PricePoint {
                date: make_date(2025, 1, 1),
                close: price,
            }],
            calls: Arc::clone(calls),
        })
    }

    fn with_history(
        source_name: &'static str,
        history: Vec<PricePoint>,
        calls: &Arc<AtomicU32>,
    ) -> Box<Self> {
        Box::new(Self {
            source_name,
            price: 0.0,
            history,
            calls: Arc::clone(calls),
        })
    }
}

#[async_trait]
impl PriceSource for FixedSource {
    fn name(&self) -> &str {
        self.source_name
    }

    async fn current_price(&self, _symbol: &str) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.price)
    }

    async fn price_history(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.history.clone())
    }
}

/// Fails every call with a fixed error, counting calls.
struct ErringSource {
    source_name: &'static str,
    error: FetchError,
    calls: Arc<AtomicU32>,
}

impl ErringSource {
    fn new(source_name: &'static str, error: FetchError, calls: &Arc<AtomicU32>) -> Box<Self> {
        Box::new(Self {
            source_name,
            error,
            calls: Arc::clone(calls),
        })
    }
}

#[async_trait]
impl PriceSource for ErringSource {
    fn name(&self) -> &str {
        self.source_name
    }

    async fn current_price(&self, _symbol: &str) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn price_history(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Fails the first `fail_first` calls with `Unavailable`, then succeeds.
struct FlakySource {
    fail_first: u32,
    price: f64,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl PriceSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn current_price(&self, _symbol: &str) -> Result<f64, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            Err(FetchError::Unavailable(format!("blip {n}")))
        } else {
            Ok(self.price)
        }
    }

    async fn price_history(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            Err(FetchError::Unavailable(format!("blip {n}")))
        } else {
            Ok(vec![PricePoint {
                date: make_date(2025, 1, 1),
                close: self.price,
            }])
        }
    }
}

fn quick_registry() -> PriceSourceRegistry {
    PriceSourceRegistry::new().with_retry_policy(RetryPolicy::immediate(3))
}

// ═══════════════════════════════════════════════════════════════════
// Retry policy
// ═══════════════════════════════════════════════════════════════════

mod backoff {
    use super::*;

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetchError>(42.0) }
        })
        .await;
        assert_eq!(result.unwrap(), 42.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<f64, _> = with_backoff(RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::NotFound("X".into())) }
        })
        .await;
        assert_eq!(result.unwrap_err(), FetchError::NotFound("X".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<f64, _> = with_backoff(RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::MalformedResponse("bad json".into())) }
        })
        .await;
        assert!(matches!(
            result.unwrap_err(),
            FetchError::MalformedResponse(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_exhausts_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<f64, _> = with_backoff(RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::RateLimited) }
        })
        .await;
        assert_eq!(result.unwrap_err(), FetchError::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(RetryPolicy::immediate(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(FetchError::Timeout)
                } else {
                    Ok(7.0)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_attempts_clamps_to_one() {
        let calls = AtomicU32::new(0);
        let result: Result<f64, _> = with_backoff(RetryPolicy::immediate(0), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Timeout) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, std::time::Duration::from_millis(500));
    }
}

// ═══════════════════════════════════════════════════════════════════
// NSE bridge history payloads
// ═══════════════════════════════════════════════════════════════════

mod history_payload {
    use super::*;

    #[test]
    fn parses_flat_list() {
        let raw = r#"[
            {"date": "2025-01-02", "closingPrice": 101.5},
            {"date": "2025-01-03", "closingPrice": 102.0}
        ]"#;
        let points = parse_history_payload(raw).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, make_date(2025, 1, 2));
        assert_eq!(points[0].close, 101.5);
    }

    #[test]
    fn parses_data_envelope() {
        let raw = r#"{"data": [{"date": "2025-01-02", "closingPrice": 99.0}]}"#;
        let points = parse_history_payload(raw).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 99.0);
    }

    #[test]
    fn parses_envelope_list() {
        let raw = r#"[
            {"data": [{"date": "2025-01-02", "closingPrice": 10.0}]},
            {"data": [{"date": "2025-01-03", "closingPrice": 11.0}]}
        ]"#;
        let points = parse_history_payload(raw).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].close, 11.0);
    }

    #[test]
    fn accepts_both_date_formats() {
        let raw = r#"[
            {"date": "2025-01-02", "closingPrice": 1.0},
            {"date": "03-Jan-2025", "closingPrice": 2.0}
        ]"#;
        let points = parse_history_payload(raw).unwrap();
        assert_eq!(points[0].date, make_date(2025, 1, 2));
        assert_eq!(points[1].date, make_date(2025, 1, 3));
    }

    #[test]
    fn output_is_sorted_by_date() {
        let raw = r#"[
            {"date": "2025-01-05", "closingPrice": 5.0},
            {"date": "2025-01-01", "closingPrice": 1.0},
            {"date": "2025-01-03", "closingPrice": 3.0}
        ]"#;
        let points = parse_history_payload(raw).unwrap();
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![
                make_date(2025, 1, 1),
                make_date(2025, 1, 3),
                make_date(2025, 1, 5)
            ]
        );
    }

    #[test]
    fn duplicate_dates_keep_last_observation() {
        let raw = r#"[
            {"date": "2025-01-02", "closingPrice": 100.0},
            {"date": "2025-01-02", "closingPrice": 105.0}
        ]"#;
        let points = parse_history_payload(raw).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 105.0);
    }

    #[test]
    fn empty_list_is_ok_and_empty() {
        let points = parse_history_payload("[]").unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        let result = parse_history_payload("not json at all");
        assert!(matches!(
            result.unwrap_err(),
            FetchError::MalformedResponse(_)
        ));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let result = parse_history_payload(r#"{"prices": [1, 2, 3]}"#);
        assert!(matches!(
            result.unwrap_err(),
            FetchError::MalformedResponse(_)
        ));
    }

    #[test]
    fn unparseable_date_is_malformed_and_named() {
        let raw = r#"[{"date": "Jan 2, 2025", "closingPrice": 1.0}]"#;
        match parse_history_payload(raw).unwrap_err() {
            FetchError::MalformedResponse(msg) => assert!(msg.contains("Jan 2, 2025")),
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Registry: current price
// ═══════════════════════════════════════════════════════════════════

mod registry_current_price {
    use super::*;

    #[tokio::test]
    async fn first_source_wins() {
        let first_calls = Arc::new(AtomicU32::new(0));
        let second_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::new("primary", 100.0, &first_calls));
        registry.register(FixedSource::new("fallback", 999.0, &second_calls));

        let price = registry.current_price("TCS").await.unwrap();
        assert_eq!(price, 100.0);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let erring_calls = Arc::new(AtomicU32::new(0));
        let good_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(ErringSource::new(
            "primary",
            FetchError::NotFound("TCS".into()),
            &erring_calls,
        ));
        registry.register(FixedSource::new("fallback", 321.0, &good_calls));

        let price = registry.current_price("TCS").await.unwrap();
        assert_eq!(price, 321.0);
        // NotFound is deterministic, so the primary was asked exactly once
        assert_eq!(erring_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_before_fallback() {
        let erring_calls = Arc::new(AtomicU32::new(0));
        let good_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(ErringSource::new(
            "primary",
            FetchError::RateLimited,
            &erring_calls,
        ));
        registry.register(FixedSource::new("fallback", 55.0, &good_calls));

        let price = registry.current_price("TCS").await.unwrap();
        assert_eq!(price, 55.0);
        // All three attempts burned on the primary before falling back
        assert_eq!(erring_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn flaky_source_recovers_without_fallback() {
        let calls = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(Box::new(FlakySource {
            fail_first: 1,
            price: 77.0,
            calls: Arc::clone(&calls),
        }));
        registry.register(FixedSource::new("fallback", 1.0, &fallback_calls));

        let price = registry.current_price("TCS").await.unwrap();
        assert_eq!(price, 77.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_price_falls_through_to_next_source() {
        let nan_calls = Arc::new(AtomicU32::new(0));
        let good_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::new("broken", f64::NAN, &nan_calls));
        registry.register(FixedSource::new("good", 250.0, &good_calls));

        let price = registry.current_price("TCS").await.unwrap();
        assert_eq!(price, 250.0);
    }

    #[tokio::test]
    async fn negative_price_alone_is_malformed() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::new("broken", -5.0, &calls));

        match registry.current_price("TCS").await.unwrap_err() {
            FetchError::MalformedResponse(msg) => {
                assert!(msg.contains("invalid price"));
                assert!(msg.contains("TCS"));
            }
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn all_sources_fail_returns_last_error() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(ErringSource::new(
            "first",
            FetchError::NotFound("TCS".into()),
            &a,
        ));
        registry.register(ErringSource::new(
            "second",
            FetchError::Unavailable("HTTP 503".into()),
            &b,
        ));

        let err = registry.current_price("TCS").await.unwrap_err();
        assert_eq!(err, FetchError::Unavailable("HTTP 503".into()));
    }

    #[tokio::test]
    async fn empty_registry_reports_no_sources() {
        let registry = PriceSourceRegistry::new();
        assert!(registry.is_empty());
        match registry.current_price("TCS").await.unwrap_err() {
            FetchError::Unavailable(msg) => assert!(msg.contains("no price sources")),
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Registry: price history
// ═══════════════════════════════════════════════════════════════════

mod registry_price_history {
    use super::*;

    #[tokio::test]
    async fn returns_points_from_first_source_with_data() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::with_history(
            "primary",
            vec![
                PricePoint {
                    date: make_date(2025, 1, 1),
                    close: 10.0,
                },
                PricePoint {
                    date: make_date(2025, 1, 2),
                    close: 11.0,
                },
            ],
            &calls,
        ));

        let points = registry
            .price_history("TCS", make_date(2025, 1, 1), make_date(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
    }

    #[tokio::test]
    async fn empty_history_falls_through_as_not_found() {
        let empty_calls = Arc::new(AtomicU32::new(0));
        let good_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::with_history("empty", Vec::new(), &empty_calls));
        registry.register(FixedSource::with_history(
            "good",
            vec![PricePoint {
                date: make_date(2025, 1, 2),
                close: 42.0,
            }],
            &good_calls,
        ));

        let points = registry
            .price_history("TCS", make_date(2025, 1, 1), make_date(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 42.0);
        assert_eq!(empty_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_source_empty_is_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::with_history("empty", Vec::new(), &calls));

        let err = registry
            .price_history("TCS", make_date(2025, 1, 1), make_date(2025, 1, 5))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound("TCS".into()));
    }

    #[tokio::test]
    async fn invalid_closes_are_dropped() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::with_history(
            "mixed",
            vec![
                PricePoint {
                    date: make_date(2025, 1, 1),
                    close: f64::NAN,
                },
                PricePoint {
                    date: make_date(2025, 1, 2),
                    close: -4.0,
                },
                PricePoint {
                    date: make_date(2025, 1, 3),
                    close: 99.0,
                },
            ],
            &calls,
        ));

        let points = registry
            .price_history("TCS", make_date(2025, 1, 1), make_date(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 99.0);
    }

    #[tokio::test]
    async fn all_invalid_closes_falls_through_as_not_found() {
        let bad_calls = Arc::new(AtomicU32::new(0));
        let good_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(FixedSource::with_history(
            "bad",
            vec![PricePoint {
                date: make_date(2025, 1, 1),
                close: f64::INFINITY,
            }],
            &bad_calls,
        ));
        registry.register(FixedSource::with_history(
            "good",
            vec![PricePoint {
                date: make_date(2025, 1, 1),
                close: 5.0,
            }],
            &good_calls,
        ));

        let points = registry
            .price_history("TCS", make_date(2025, 1, 1), make_date(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(points[0].close, 5.0);
    }

    #[tokio::test]
    async fn transient_history_failure_falls_back() {
        let err_calls = Arc::new(AtomicU32::new(0));
        let good_calls = Arc::new(AtomicU32::new(0));
        let mut registry = quick_registry();
        registry.register(ErringSource::new(
            "down",
            FetchError::Unavailable("HTTP 502".into()),
            &err_calls,
        ));
        registry.register(FixedSource::with_history(
            "good",
            vec![PricePoint {
                date: make_date(2025, 1, 3),
                close: 7.0,
            }],
            &good_calls,
        ));

        let points = registry
            .price_history("TCS", make_date(2025, 1, 1), make_date(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(err_calls.load(Ordering::SeqCst), 3);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Registry: construction
// ═══════════════════════════════════════════════════════════════════

mod registry_construction {
    use super::*;

    #[test]
    fn source_names_follow_registration_order() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let mut registry = PriceSourceRegistry::new();
        registry.register(FixedSource::new("one", 1.0, &a));
        registry.register(FixedSource::new("two", 2.0, &b));
        assert_eq!(registry.source_names(), vec!["one", "two"]);
        assert!(!registry.is_empty());
    }

    #[test]
    fn new_registry_is_empty() {
        assert!(PriceSourceRegistry::new().is_empty());
        assert!(PriceSourceRegistry::default().is_empty());
    }
}
