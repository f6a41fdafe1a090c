//! Query service — composes the pool and cache for dashboard route handlers.
//!
//! Control flow per query: cache probe → on miss, acquire a pooled
//! connection → execute → store a snapshot → return. Execution happens with
//! no cache lock held; the cache is only consulted before and after. The
//! pool and cache stay independent utilities — there is no coordination
//! between them beyond this caller discipline.

use crate::cache::{CacheStats, QueryCache};
use crate::config::RedlineConfig;
use crate::engine::{ConnectionFactory, EngineConnection, EngineError, TableResult};
use crate::params::QueryParams;
use crate::pool::{ConnectionPool, PoolError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the service to route handlers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A query result with its provenance.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub result: TableResult,
    /// True when the result was served from the cache without touching the
    /// engine.
    pub from_cache: bool,
}

/// Pool + cache composition serving repeated analytical queries.
pub struct QueryService {
    pool: ConnectionPool,
    cache: QueryCache,
    acquire_timeout: Duration,
}

impl QueryService {
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: &RedlineConfig) -> Self {
        Self {
            pool: ConnectionPool::new(factory, config.pool.max_connections),
            cache: QueryCache::new(
                config.cache.max_size,
                Duration::from_secs(config.cache.ttl_seconds),
            ),
            acquire_timeout: Duration::from_millis(config.pool.acquire_timeout_ms),
        }
    }

    /// Execute a query, serving from the cache when a fresh result exists.
    pub fn query(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
    ) -> Result<QueryOutcome, ServiceError> {
        if let Some(hit) = self.cache.get(sql, params) {
            return Ok(QueryOutcome {
                result: hit,
                from_cache: true,
            });
        }

        let mut conn = self.pool.acquire(self.acquire_timeout)?;
        let result = conn.execute(sql, params)?;
        self.cache.set(sql, params, &result);

        Ok(QueryOutcome {
            result,
            from_cache: false,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Shut the pool down; leased connections close as their guards drop.
    pub fn shutdown(&self) {
        self.pool.shutdown()
    }
}
