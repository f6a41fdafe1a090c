//! Canonical Polars schema for OHLCV bar frames, plus bar↔frame conversion.
//!
//! The store writes frames in this shape and the query layer exposes it as
//! the `bars` table, so both sides share one definition.

use crate::data::provider::OhlcvBar;
use chrono::NaiveDate;
use polars::prelude::*;

/// Expected schema for bar frames: `date, open, high, low, close, volume, adj_close`.
pub struct BarSchema;

impl BarSchema {
    /// Get the canonical bar schema.
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("date".into(), DataType::Date),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::UInt64),
            Field::new("adj_close".into(), DataType::Float64),
        ])
    }

    /// Validate a DataFrame against the canonical schema.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("frame construction failed: {0}")]
    Construction(String),

    #[error("column read failed: {0}")]
    ColumnRead(String),

    #[error("null date at row {0}")]
    NullDate(usize),
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Convert bars to a DataFrame in the canonical schema.
pub fn bars_to_frame(bars: &[OhlcvBar]) -> Result<DataFrame, SchemaError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let adj_closes: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| SchemaError::Construction(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("adj_close".into(), adj_closes),
    ])
    .map_err(|e| SchemaError::Construction(format!("dataframe creation: {e}")))
}

/// Convert a canonical-schema DataFrame back to bars.
pub fn frame_to_bars(df: &DataFrame) -> Result<Vec<OhlcvBar>, SchemaError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| SchemaError::ColumnRead(format!("{name}: {e}")))
    };

    let date_ca = col("date")?
        .date()
        .map_err(|e| SchemaError::ColumnRead(format!("date type: {e}")))?;
    let open_ca = col("open")?
        .f64()
        .map_err(|e| SchemaError::ColumnRead(format!("open type: {e}")))?;
    let high_ca = col("high")?
        .f64()
        .map_err(|e| SchemaError::ColumnRead(format!("high type: {e}")))?;
    let low_ca = col("low")?
        .f64()
        .map_err(|e| SchemaError::ColumnRead(format!("low type: {e}")))?;
    let close_ca = col("close")?
        .f64()
        .map_err(|e| SchemaError::ColumnRead(format!("close type: {e}")))?;
    let vol_ca = col("volume")?
        .u64()
        .map_err(|e| SchemaError::ColumnRead(format!("volume type: {e}")))?;
    let adj_ca = col("adj_close")?
        .f64()
        .map_err(|e| SchemaError::ColumnRead(format!("adj_close type: {e}")))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca.get(i).ok_or(SchemaError::NullDate(i))?;
        let date = epoch() + chrono::Duration::days(date_days as i64);

        bars.push(OhlcvBar {
            date,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            adj_close: adj_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bars() -> Vec<OhlcvBar> {
        vec![
            OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: 1000,
                adj_close: 100.5,
            },
            OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: 102.0,
                volume: 1100,
                adj_close: 101.5,
            },
        ]
    }

    #[test]
    fn frame_roundtrip_preserves_bars() {
        let bars = sample_bars();
        let df = bars_to_frame(&bars).unwrap();
        assert_eq!(df.height(), 2);
        BarSchema::validate(&df).unwrap();

        let back = frame_to_bars(&df).unwrap();
        assert_eq!(back, bars);
    }

    #[test]
    fn validate_rejects_missing_column() {
        let bars = sample_bars();
        let mut df = bars_to_frame(&bars).unwrap();
        let _ = df.drop_in_place("volume").unwrap();

        let err = BarSchema::validate(&df).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn(_)));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let df = DataFrame::new(vec![
            Column::new("date".into(), vec!["2024-01-02"]),
            Column::new("open".into(), vec![100.0]),
            Column::new("high".into(), vec![102.0]),
            Column::new("low".into(), vec![99.0]),
            Column::new("close".into(), vec![101.0]),
            Column::new("volume".into(), vec![1000u64]),
            Column::new("adj_close".into(), vec![100.5]),
        ])
        .unwrap();

        let err = BarSchema::validate(&df).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn schema_has_all_required_columns() {
        let schema = BarSchema::schema();
        for name in ["date", "open", "high", "low", "close", "volume", "adj_close"] {
            assert!(schema.contains(name));
        }
    }
}
