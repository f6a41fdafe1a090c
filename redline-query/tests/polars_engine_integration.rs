//! End-to-end: Parquet store → polars SQL engine → pooled cached queries.

use chrono::NaiveDate;
use polars::prelude::*;
use redline_core::data::{DataSource, Interval, OhlcvBar, ParquetStore};
use redline_query::{
    ConnectionFactory, EngineConnection, EngineError, ParamValue, PolarsFactory, QueryParams,
    QueryService, RedlineConfig,
};
use std::sync::Arc;

fn bar(y: i32, m: u32, d: u32, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000,
        adj_close: close,
    }
}

/// Store with two symbols of daily bars.
fn seeded_store(dir: &std::path::Path) -> ParquetStore {
    let store = ParquetStore::new(dir);
    store
        .write(
            "SPY",
            Interval::Daily,
            &[
                bar(2024, 1, 2, 101.0),
                bar(2024, 1, 3, 102.0),
                bar(2024, 1, 4, 103.0),
            ],
            DataSource::Synthetic,
        )
        .unwrap();
    store
        .write(
            "QQQ",
            Interval::Daily,
            &[bar(2024, 1, 2, 401.0), bar(2024, 1, 3, 402.0)],
            DataSource::Synthetic,
        )
        .unwrap();
    store
}

#[test]
fn sql_over_store_filters_by_hive_symbol() {
    let dir = tempfile::tempdir().unwrap();
    seeded_store(dir.path());

    let factory = Arc::new(PolarsFactory::new(dir.path()));
    let mut conn = factory.connect().unwrap();

    let mut params = QueryParams::new();
    params.insert("sym".into(), ParamValue::Text("SPY".into()));

    let result = conn
        .execute(
            "SELECT date, close FROM bars WHERE symbol = $sym ORDER BY date",
            Some(&params),
        )
        .unwrap();

    assert_eq!(result.num_rows(), 3);
    let closes = result.frame().column("close").unwrap().f64().unwrap();
    assert_eq!(closes.get(0), Some(101.0));
    assert_eq!(closes.get(2), Some(103.0));
}

#[test]
fn numeric_parameter_filters_rows() {
    let dir = tempfile::tempdir().unwrap();
    seeded_store(dir.path());

    let factory = Arc::new(PolarsFactory::new(dir.path()));
    let mut conn = factory.connect().unwrap();

    let mut params = QueryParams::new();
    params.insert("min".into(), ParamValue::Float(200.0));

    let result = conn
        .execute("SELECT symbol, close FROM bars WHERE close > $min", Some(&params))
        .unwrap();

    assert_eq!(result.num_rows(), 2); // only QQQ bars clear 200
}

#[test]
fn connect_fails_when_store_is_missing() {
    let factory = PolarsFactory::new("/nonexistent/redline-store");
    let err = factory.connect().unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}

#[test]
fn closed_connection_refuses_queries() {
    let dir = tempfile::tempdir().unwrap();
    seeded_store(dir.path());

    let factory = PolarsFactory::new(dir.path());
    let mut conn = factory.connect().unwrap();
    conn.close();

    let err = conn.execute("SELECT 1 FROM bars", None).unwrap_err();
    assert!(matches!(err, EngineError::Closed));
}

#[test]
fn bad_sql_is_a_query_error() {
    let dir = tempfile::tempdir().unwrap();
    seeded_store(dir.path());

    let factory = PolarsFactory::new(dir.path());
    let mut conn = factory.connect().unwrap();

    let err = conn.execute("SELEKT nonsense", None).unwrap_err();
    assert!(matches!(err, EngineError::Query(_)));
}

#[test]
fn service_over_polars_engine_caches_repeat_queries() {
    let dir = tempfile::tempdir().unwrap();
    seeded_store(dir.path());

    let factory = Arc::new(PolarsFactory::new(dir.path()));
    let service = QueryService::new(factory, &RedlineConfig::default());

    let mut params = QueryParams::new();
    params.insert("sym".into(), ParamValue::Text("SPY".into()));
    let q = "SELECT date, close FROM bars WHERE symbol = $sym ORDER BY date";

    let first = service.query(q, Some(&params)).unwrap();
    let second = service.query(q, Some(&params)).unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert!(first.result.same_data(&second.result));
    assert_eq!(service.cache_stats().size, 1);

    service.shutdown();
    assert_eq!(service.pool().created(), 0);
}
