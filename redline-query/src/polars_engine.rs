//! Embedded analytical engine over the Parquet store, using polars SQL.
//!
//! Each connection owns a `SQLContext` with the store's bar partitions
//! registered as the `bars` table. The Hive partition keys surface as
//! `symbol` and `timeframe` columns, so queries can filter across symbols.
//!
//! The SQL interface has no native parameter binding; `$name` placeholders
//! are substituted with rendered SQL literals before execution.

use crate::engine::{ConnectionFactory, EngineConnection, EngineError, TableResult};
use crate::params::QueryParams;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::path::PathBuf;

/// Factory for connections over a Parquet store directory.
pub struct PolarsFactory {
    store_root: PathBuf,
}

impl PolarsFactory {
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
        }
    }
}

impl ConnectionFactory for PolarsFactory {
    fn name(&self) -> &'static str {
        "polars"
    }

    fn connect(&self) -> Result<Box<dyn EngineConnection>, EngineError> {
        if !self.store_root.exists() {
            return Err(EngineError::Unavailable(format!(
                "store directory {} does not exist",
                self.store_root.display()
            )));
        }

        let pattern = self.store_root.join("**").join("*.parquet");
        let mut args = ScanArgsParquet::default();
        args.hive_options.enabled = Some(true);

        let frame = LazyFrame::scan_parquet(&pattern, args)
            .map_err(|e| EngineError::Unavailable(format!("scan store: {e}")))?;

        let mut ctx = SQLContext::new();
        ctx.register("bars", frame);

        Ok(Box::new(PolarsConnection { ctx, closed: false }))
    }
}

/// One polars SQL session.
pub struct PolarsConnection {
    ctx: SQLContext,
    closed: bool,
}

impl std::fmt::Debug for PolarsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolarsConnection")
            .field("closed", &self.closed)
            .finish()
    }
}

impl EngineConnection for PolarsConnection {
    fn execute(
        &mut self,
        query: &str,
        params: Option<&QueryParams>,
    ) -> Result<TableResult, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }

        let sql = bind_params(query, params);
        let df = self
            .ctx
            .execute(&sql)
            .and_then(|lf| lf.collect())
            .map_err(|e| EngineError::Query(e.to_string()))?;

        Ok(TableResult::new(df))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Substitute `$name` placeholders with rendered SQL literals.
///
/// Names substitute longest-first so `$s` cannot capture a prefix of
/// `$symbol`. Unknown placeholders are left untouched and surface as engine
/// parse errors.
fn bind_params(query: &str, params: Option<&QueryParams>) -> String {
    let Some(params) = params else {
        return query.to_string();
    };

    let mut names: Vec<&String> = params.keys().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let mut sql = query.to_string();
    for name in names {
        sql = sql.replace(&format!("${name}"), &params[name].to_sql_literal());
    }
    sql
}
