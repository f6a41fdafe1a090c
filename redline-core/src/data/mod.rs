//! Market data acquisition and storage

pub mod alphavantage;
pub mod circuit_breaker;
pub mod download;
pub mod finnhub;
pub mod provider;
pub mod stooq;
pub mod store;
pub mod synthetic;
pub mod validate;
pub mod yahoo;

pub use alphavantage::AlphaVantageProvider;
pub use circuit_breaker::CircuitBreaker;
pub use download::{download_symbols, DownloadSummary};
pub use finnhub::FinnhubProvider;
pub use provider::{
    DataError, DataSource, FetchProgress, FetchResult, Interval, MarketDataProvider, OhlcvBar,
    StdoutProgress,
};
pub use stooq::StooqProvider;
pub use store::{Coverage, ParquetStore, StoreMeta, StoreStatus};
pub use synthetic::SyntheticProvider;
pub use validate::{canonicalize, ValidationReport};
pub use yahoo::YahooProvider;
