//! End-to-end download pipeline: provider → validation → Parquet store.

use chrono::NaiveDate;
use redline_core::data::{
    download_symbols, Coverage, DataError, FetchProgress, FetchResult, Interval,
    MarketDataProvider, ParquetStore, SyntheticProvider,
};

struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: &Result<(), DataError>,
    ) {
    }
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

/// Provider that fails every fetch and reports itself unavailable afterwards.
struct FailingProvider {
    available: std::sync::atomic::AtomicBool,
}

impl FailingProvider {
    fn new() -> Self {
        Self {
            available: std::sync::atomic::AtomicBool::new(true),
        }
    }
}

impl MarketDataProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn fetch(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
        _interval: Interval,
    ) -> Result<FetchResult, DataError> {
        self.available
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Err(DataError::CircuitBreakerTripped)
    }

    fn is_available(&self) -> bool {
        self.available.load(std::sync::atomic::Ordering::SeqCst)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn download_stores_and_covers_range() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::new(dir.path());
    let provider = SyntheticProvider::new();

    let summary = download_symbols(
        &provider,
        &store,
        &["SPY", "QQQ"],
        date(2024, 1, 1),
        date(2024, 3, 1),
        Interval::Daily,
        false,
        &SilentProgress,
    );

    assert!(summary.all_succeeded());
    assert_eq!(summary.succeeded, 2);

    let bars = store.load("SPY", Interval::Daily).unwrap();
    assert!(!bars.is_empty());
    assert_eq!(
        store.covers_range("SPY", Interval::Daily, date(2024, 1, 1), date(2024, 3, 1)),
        Coverage::Full
    );
}

#[test]
fn second_download_skips_covered_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::new(dir.path());
    let provider = SyntheticProvider::new();

    download_symbols(
        &provider,
        &store,
        &["SPY"],
        date(2024, 1, 1),
        date(2024, 2, 1),
        Interval::Daily,
        false,
        &SilentProgress,
    );
    let first_meta = store.get_meta("SPY", Interval::Daily).unwrap();

    // Narrower request is already covered; the store should be untouched
    let summary = download_symbols(
        &provider,
        &store,
        &["SPY"],
        date(2024, 1, 10),
        date(2024, 1, 20),
        Interval::Daily,
        false,
        &SilentProgress,
    );

    assert!(summary.all_succeeded());
    let second_meta = store.get_meta("SPY", Interval::Daily).unwrap();
    assert_eq!(first_meta.data_hash, second_meta.data_hash);
    assert_eq!(first_meta.stored_at, second_meta.stored_at);
}

#[test]
fn breaker_trip_fails_remaining_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::new(dir.path());
    let provider = FailingProvider::new();

    let summary = download_symbols(
        &provider,
        &store,
        &["AAA", "BBB", "CCC"],
        date(2024, 1, 1),
        date(2024, 2, 1),
        Interval::Daily,
        false,
        &SilentProgress,
    );

    assert_eq!(summary.failed, 3);
    assert_eq!(summary.succeeded, 0);
    // Only the first symbol was actually attempted; the rest were marked
    // failed when the provider became unavailable.
    assert_eq!(summary.errors.len(), 3);
}

#[test]
fn weekly_and_daily_series_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::new(dir.path());
    let provider = SyntheticProvider::new();

    for interval in [Interval::Daily, Interval::Weekly] {
        let summary = download_symbols(
            &provider,
            &store,
            &["SPY"],
            date(2024, 1, 1),
            date(2024, 3, 1),
            interval,
            false,
            &SilentProgress,
        );
        assert!(summary.all_succeeded());
    }

    let daily = store.load("SPY", Interval::Daily).unwrap();
    let weekly = store.load("SPY", Interval::Weekly).unwrap();
    assert!(daily.len() > weekly.len());
}
