//! REDLINE Query — cached analytical querying for the dashboard layer.
//!
//! Two small, independent utilities reduce redundant work against the
//! embedded analytical engine:
//! - `ConnectionPool`: bounded pool of reusable engine connections
//! - `QueryCache`: bounded, time-expiring cache of query results
//!
//! They are composed by caller discipline, not by an internal scheduler;
//! `QueryService` is that thin composition. `PolarsFactory` provides the
//! production engine over the redline-core Parquet store.

pub mod cache;
pub mod config;
pub mod engine;
pub mod params;
pub mod polars_engine;
pub mod pool;
pub mod service;

pub use cache::{CacheStats, QueryCache};
pub use config::{
    CacheConfig, ConfigError, PoolConfig, ProviderConfig, RedlineConfig, StoreConfig,
};
pub use engine::{ConnectionFactory, EngineConnection, EngineError, TableResult};
pub use params::{cache_key, CacheKey, ParamValue, QueryParams};
pub use polars_engine::{PolarsConnection, PolarsFactory};
pub use pool::{ConnectionPool, PoolError, PooledConnection};
pub use service::{QueryOutcome, QueryService, ServiceError};
