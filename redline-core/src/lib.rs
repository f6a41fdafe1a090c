//! REDLINE Core — market-data acquisition and storage.
//!
//! This crate contains the data layer of REDLINE:
//! - OHLCV domain types and the canonical bar-frame schema
//! - Data providers (Yahoo Finance, Stooq, Alpha Vantage, Finnhub, synthetic)
//! - Circuit breaker shared by the HTTP providers
//! - Bar validation and canonicalization
//! - Hive-partitioned Parquet store with metadata sidecars
//! - Multi-symbol download orchestration with progress reporting

pub mod data;
pub mod schema;

pub use data::provider::{
    DataError, DataSource, FetchProgress, FetchResult, Interval, MarketDataProvider, OhlcvBar,
    StdoutProgress,
};
