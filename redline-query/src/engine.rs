//! Engine seam: connection and factory traits plus the tabular result type.
//!
//! The embedded analytical engine is a collaborator, not part of this crate.
//! The pool wraps its connect/close, the cache stores its results, and both
//! work against these traits so tests can substitute a mock engine.

use crate::params::QueryParams;
use polars::prelude::DataFrame;
use thiserror::Error;

/// Errors from the engine layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not open a connection or reach its data.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The query itself failed (parse error, unknown column, ...).
    #[error("query failed: {0}")]
    Query(String),

    /// The connection was closed and cannot execute.
    #[error("connection is closed")]
    Closed,
}

/// Tabular query result: rows × named columns.
///
/// Wraps a polars `DataFrame`. `snapshot` is the defensive copy handed
/// across the cache boundary — the clone is Arc-backed and cheap, and
/// mutating one copy never affects the other.
#[derive(Debug, Clone)]
pub struct TableResult {
    frame: DataFrame,
}

impl TableResult {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn num_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn num_columns(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Cheap defensive copy.
    pub fn snapshot(&self) -> TableResult {
        self.clone()
    }

    /// Value equality over all cells (DataFrame does not implement PartialEq).
    pub fn same_data(&self, other: &TableResult) -> bool {
        self.frame.equals(&other.frame)
    }
}

/// One session with the analytical engine.
///
/// Owned by the pool; leased to one caller at a time.
pub trait EngineConnection: Send + std::fmt::Debug {
    /// Execute a query, substituting any bound parameters.
    fn execute(
        &mut self,
        query: &str,
        params: Option<&QueryParams>,
    ) -> Result<TableResult, EngineError>;

    /// Close the underlying session. Idempotent.
    fn close(&mut self);
}

/// Opens engine connections for the pool.
pub trait ConnectionFactory: Send + Sync {
    /// Human-readable engine name.
    fn name(&self) -> &'static str;

    /// Open a new connection.
    fn connect(&self) -> Result<Box<dyn EngineConnection>, EngineError>;
}
