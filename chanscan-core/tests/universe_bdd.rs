//! BDD tests for the universe stage and its cache.
//!
//! Scenarios:
//! - A fresh fetch is filtered and cached; a second load hits the cache
//! - Yesterday's snapshot is never served today
//! - A non-trading day yields an empty, uncached snapshot
//! - A provider that cannot log in surfaces ProviderUnavailable
//! - A failed listing query surfaces ProviderQueryFailed and still logs out

use chrono::NaiveDate;
use chanscan_core::data::{
    fetch_universe, load_universe, CacheManager, ExclusionRule, MarketDataProvider,
    ProviderError, RawListing, SyntheticProvider, UnavailableProvider, UniverseError,
    UniverseFilter,
};
use chanscan_core::ScanContext;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

/// Counts listing queries so cache hits can be observed.
struct CountingProvider {
    inner: SyntheticProvider,
    queries: AtomicUsize,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            inner: SyntheticProvider::new(),
            queries: AtomicUsize::new(0),
        }
    }
}

impl MarketDataProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }
    fn login(&self) -> Result<(), ProviderError> {
        Ok(())
    }
    fn query_listing(&self, day: NaiveDate) -> Result<RawListing, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_listing(day)
    }
    fn logout(&self) {}
}

#[test]
fn bdd_scenario_fetch_filters_synthetic_listing() {
    // GIVEN the synthetic listing and the default exclusion chain
    let provider = SyntheticProvider::new();
    let filter = UniverseFilter::default();

    // WHEN the universe is fetched
    let (snapshot, report) = fetch_universe(&provider, &filter, monday()).unwrap();

    // THEN only main-board, trading, non-ST Shanghai/Shenzhen symbols remain
    let codes: Vec<&str> = snapshot.symbols().iter().map(|s| s.code.as_str()).collect();
    assert_eq!(
        codes,
        vec!["600000", "600036", "601398", "603288", "000001", "000002", "002415", "300750"]
    );

    // AND every removed row is charged to exactly one rule
    assert_eq!(report.raw_rows, 14);
    assert_eq!(report.kept + report.total_excluded(), report.raw_rows);
    assert_eq!(report.excluded_by(ExclusionRule::UnsupportedExchange), 1);
    assert_eq!(report.excluded_by(ExclusionRule::NotTrading), 1);
}

#[test]
fn bdd_scenario_second_load_hits_cache() {
    // GIVEN an empty cache
    let dir = tempfile::tempdir().unwrap();
    let ctx = ScanContext::new(monday()).with_cache(CacheManager::new(dir.path()));
    let provider = CountingProvider::new();
    let filter = UniverseFilter::default();

    // WHEN the universe is loaded twice on the same day
    let first = load_universe(&ctx, &provider, &filter, false).unwrap();
    let second = load_universe(&ctx, &provider, &filter, false).unwrap();

    // THEN the provider is queried once and both loads agree
    assert_eq!(provider.queries.load(Ordering::SeqCst), 1);
    assert_eq!(first.len(), second.len());
    assert_eq!(first.symbols()[0].full_code(), second.symbols()[0].full_code());

    // AND a forced refresh queries again
    load_universe(&ctx, &provider, &filter, true).unwrap();
    assert_eq!(provider.queries.load(Ordering::SeqCst), 2);
}

#[test]
fn bdd_scenario_yesterdays_snapshot_is_not_reused() {
    // GIVEN a snapshot cached yesterday
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(dir.path());
    let yesterday = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
    let provider = CountingProvider::new();
    let filter = UniverseFilter::default();
    load_universe(
        &ScanContext::new(yesterday).with_cache(cache.clone()),
        &provider,
        &filter,
        false,
    )
    .unwrap();

    // WHEN loading today
    let snapshot = load_universe(
        &ScanContext::new(monday()).with_cache(cache),
        &provider,
        &filter,
        false,
    )
    .unwrap();

    // THEN the provider is queried again and the snapshot carries today's date
    assert_eq!(provider.queries.load(Ordering::SeqCst), 2);
    assert_eq!(snapshot.date(), monday());
}

#[test]
fn bdd_scenario_non_trading_day_is_empty_and_uncached() {
    // GIVEN a Saturday
    let saturday = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(dir.path());
    let ctx = ScanContext::new(saturday).with_cache(cache.clone());

    // WHEN the universe is loaded
    let snapshot = load_universe(&ctx, &SyntheticProvider::new(), &UniverseFilter::default(), false)
        .unwrap();

    // THEN it is empty and nothing is written to the cache
    assert!(snapshot.is_empty());
    assert!(cache.get_universe(saturday).unwrap().is_none());
}

#[test]
fn bdd_scenario_login_failure_is_provider_unavailable() {
    // GIVEN a provider that refuses to log in
    let provider = UnavailableProvider::new("no adapter linked");

    // WHEN fetching the universe
    let err = fetch_universe(&provider, &UniverseFilter::default(), monday()).unwrap_err();

    // THEN the stage fails with ProviderUnavailable
    assert!(matches!(err, UniverseError::ProviderUnavailable(_)));
}

#[test]
fn bdd_scenario_disabled_rule_lets_symbols_through() {
    // GIVEN a filter without the STAR market rule
    let filter = UniverseFilter::default().without(ExclusionRule::StarMarket);

    // WHEN fetching
    let (snapshot, report) =
        fetch_universe(&SyntheticProvider::new(), &filter, monday()).unwrap();

    // THEN 688001 is kept and nothing is charged to the disabled rule
    assert!(snapshot.get("688001").is_some());
    assert_eq!(report.excluded_by(ExclusionRule::StarMarket), 0);
}

/// Logs in fine, then rejects every listing query.
struct RejectingProvider {
    logged_out: AtomicBool,
}

impl MarketDataProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }
    fn login(&self) -> Result<(), ProviderError> {
        Ok(())
    }
    fn query_listing(&self, _day: NaiveDate) -> Result<RawListing, ProviderError> {
        Err(ProviderError::QueryFailed {
            code: "10004011".into(),
            message: "query rejected".into(),
        })
    }
    fn logout(&self) {
        self.logged_out.store(true, Ordering::SeqCst);
    }
}

#[test]
fn bdd_scenario_query_failure_is_provider_query_failed() {
    // GIVEN a provider whose listing query fails after login
    let provider = RejectingProvider {
        logged_out: AtomicBool::new(false),
    };

    // WHEN fetching the universe
    let err = fetch_universe(&provider, &UniverseFilter::default(), monday()).unwrap_err();

    // THEN the stage fails with ProviderQueryFailed carrying the provider message
    match err {
        UniverseError::ProviderQueryFailed(message) => assert!(message.contains("query rejected")),
        other => panic!("unexpected error {other:?}"),
    }

    // AND the session was still closed
    assert!(provider.logged_out.load(Ordering::SeqCst));
}
