//! Provider seam: bar type, structured error types, and the provider trait.
//!
//! The MarketDataProvider trait abstracts over feeds (Yahoo Finance, Stooq,
//! Alpha Vantage, Finnhub, synthetic) so the download pipeline can swap
//! sources and tests can run without the network.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw OHLCV bar as returned by a provider (before validation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// Bar resolution requested from a provider.
///
/// Each provider maps this to its own interval token; the Parquet store uses
/// it as a partition dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Directory name used by the store's partition layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" | "d" | "1d" => Ok(Interval::Daily),
            "weekly" | "w" | "1w" => Ok(Interval::Weekly),
            "monthly" | "m" | "1m" => Ok(Interval::Monthly),
            other => Err(format!(
                "unknown interval '{other}' (expected daily, weekly, or monthly)"
            )),
        }
    }
}

/// Structured error types for acquisition and storage operations.
///
/// These are designed to be displayable at both the CLI and service layers.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("no API key configured for {provider}")]
    MissingApiKey { provider: &'static str },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no stored data for '{symbol}' ({interval}) — run `download {symbol}` first")]
    NoStoredData { symbol: String, interval: Interval },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful data fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub interval: Interval,
    pub bars: Vec<OhlcvBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Yahoo,
    Stooq,
    AlphaVantage,
    Finnhub,
    Synthetic,
    Store,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Yahoo => "yahoo",
            DataSource::Stooq => "stooq",
            DataSource::AlphaVantage => "alpha_vantage",
            DataSource::Finnhub => "finnhub",
            DataSource::Synthetic => "synthetic",
            DataSource::Store => "store",
        }
    }
}

/// Trait for market data providers.
///
/// Implementations handle the specifics of fetching from a particular feed.
/// The store sits above this trait — providers don't know about the store.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &'static str;

    /// Fetch OHLCV bars for a symbol over a date range at the given interval.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol operations.
pub trait FetchProgress: Send {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_aliases() {
        assert_eq!("daily".parse::<Interval>().unwrap(), Interval::Daily);
        assert_eq!("d".parse::<Interval>().unwrap(), Interval::Daily);
        assert_eq!("1w".parse::<Interval>().unwrap(), Interval::Weekly);
        assert_eq!("monthly".parse::<Interval>().unwrap(), Interval::Monthly);
        assert!("hourly".parse::<Interval>().is_err());
    }

    #[test]
    fn interval_display_matches_partition_name() {
        assert_eq!(Interval::Daily.to_string(), "daily");
        assert_eq!(Interval::Weekly.to_string(), "weekly");
        assert_eq!(Interval::Monthly.to_string(), "monthly");
    }
}
