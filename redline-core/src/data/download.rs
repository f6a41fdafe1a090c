//! Download orchestrator — coordinates multi-symbol downloads with progress
//! reporting and validation before storage.

use super::provider::{DataError, FetchProgress, Interval, MarketDataProvider};
use super::store::{Coverage, ParquetStore};
use super::validate;
use chrono::NaiveDate;

/// Download multiple symbols, running each through validation and into the store.
///
/// Symbols whose stored range already covers the request are skipped unless
/// `force` is set. If the provider's circuit breaker trips mid-batch, the
/// remaining symbols are marked failed without further requests.
pub fn download_symbols(
    provider: &dyn MarketDataProvider,
    store: &ParquetStore,
    symbols: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
    force: bool,
    progress: &dyn FetchProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        // Skip if the store already covers the range and we're not forcing
        if !force {
            if let Coverage::Full = store.covers_range(symbol, interval, start, end) {
                progress.on_complete(symbol, i, total, &Ok(()));
                succeeded += 1;
                continue;
            }
        }

        let result = download_single(provider, store, symbol, start, end, interval);
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => {
                errors.push((symbol.to_string(), e));
                failed += 1;
            }
        }

        // Bail out early if the circuit breaker tripped
        if !provider.is_available() {
            for sym in &symbols[(i + 1)..total] {
                errors.push((sym.to_string(), DataError::CircuitBreakerTripped));
                failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Download a single symbol: fetch → validate → store.
fn download_single(
    provider: &dyn MarketDataProvider,
    store: &ParquetStore,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
) -> Result<(), DataError> {
    let fetched = provider.fetch(symbol, start, end, interval)?;
    let report = validate::canonicalize(fetched.bars)?;
    if !report.is_clean() {
        eprintln!(
            "WARNING: {symbol}: dropped {} invalid and {} duplicate bars",
            report.dropped_invalid, report.dropped_duplicates
        );
    }
    store.write(symbol, interval, &report.accepted, fetched.source)?;
    Ok(())
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
