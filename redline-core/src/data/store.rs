//! Parquet store with Hive-style partitioning.
//!
//! Layout: `{root}/symbol={SYMBOL}/timeframe={daily|weekly|monthly}/{year}.parquet`
//!
//! Both partition keys are plain `key=value` directory segments so a Hive
//! scan surfaces them as `symbol` and `timeframe` columns. (`timeframe`
//! rather than `interval` — INTERVAL is a SQL keyword.)
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per symbol+interval (hash, date range, source provider)
//! - Age-based cleanup for symbols that are no longer refreshed

use super::provider::{DataError, DataSource, Interval, OhlcvBar};
use crate::schema::{bars_to_frame, frame_to_bars, BarSchema};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for one stored symbol+interval series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub stored_at: NaiveDateTime,
}

/// The Parquet store.
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a symbol: `{root}/symbol={SYMBOL}/`
    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("symbol={symbol}"))
    }

    /// Directory for a symbol+interval series.
    fn series_dir(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("timeframe={}", interval.as_str()))
    }

    /// Path to the Parquet file for a symbol+interval+year.
    fn year_path(&self, symbol: &str, interval: Interval, year: i32) -> PathBuf {
        self.series_dir(symbol, interval).join(format!("{year}.parquet"))
    }

    /// Path to the metadata sidecar for a symbol+interval series.
    fn meta_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.series_dir(symbol, interval).join("meta.json")
    }

    /// Write bars for a symbol to the store, one Parquet file per year.
    ///
    /// Writes are atomic: write to .tmp then rename. The metadata sidecar
    /// records the provider the bars came from.
    pub fn write(
        &self,
        symbol: &str,
        interval: Interval,
        bars: &[OhlcvBar],
        source: DataSource,
    ) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::StoreError("no bars to store".into()));
        }

        let dir = self.series_dir(symbol, interval);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        // Group bars by year
        let mut by_year: HashMap<i32, Vec<OhlcvBar>> = HashMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar.clone());
        }

        // Write each year partition
        for (year, year_bars) in &by_year {
            let df = bars_to_frame(year_bars)
                .map_err(|e| DataError::ParquetError(e.to_string()))?;
            let path = self.year_path(symbol, interval, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;

            // Atomic rename
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::StoreError(format!("atomic rename failed: {e}"))
            })?;
        }

        // Write metadata sidecar
        let meta = StoreMeta {
            symbol: symbol.to_string(),
            interval,
            start_date: bars.first().unwrap().date,
            end_date: bars.last().unwrap().date,
            bar_count: bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(bars)
                    .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: source.as_str().to_string(),
            stored_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol, interval), meta_json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load all stored bars for a symbol+interval, sorted by date ascending.
    pub fn load(&self, symbol: &str, interval: Interval) -> Result<Vec<OhlcvBar>, DataError> {
        let dir = self.series_dir(symbol, interval);
        if !dir.exists() {
            return Err(DataError::NoStoredData {
                symbol: symbol.to_string(),
                interval,
            });
        }

        let mut all_bars = Vec::new();

        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::StoreError(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| DataError::StoreError(format!("dir entry: {e}")))?;
            let path = entry.path();

            // Skip non-parquet files (meta.json, .quarantined, etc)
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    // Quarantine the corrupt file
                    let quarantine = path.with_extension("parquet.quarantined");
                    eprintln!(
                        "WARNING: quarantining corrupt store file {}: {e}",
                        path.display()
                    );
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoStoredData {
                symbol: symbol.to_string(),
                interval,
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    /// Read the metadata sidecar for a symbol+interval, if present.
    pub fn get_meta(&self, symbol: &str, interval: Interval) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(symbol, interval)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Check which symbols have stored data at the interval, and their ranges.
    pub fn status(&self, symbols: &[&str], interval: Interval) -> Vec<StoreStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym, interval);
                StoreStatus {
                    symbol: sym.to_string(),
                    interval,
                    stored: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }

    /// List all symbols present in the store.
    pub fn symbols(&self) -> Result<Vec<String>, DataError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| DataError::StoreError(format!("read root: {e}")))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::StoreError(format!("dir entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Some(symbol) = name.strip_prefix("symbol=") {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    /// Check if stored data covers the requested date range.
    pub fn covers_range(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Coverage {
        match self.get_meta(symbol, interval) {
            None => Coverage::NotStored,
            Some(meta) => {
                if meta.start_date <= start && meta.end_date >= end {
                    Coverage::Full
                } else {
                    Coverage::Partial {
                        stored_start: meta.start_date,
                        stored_end: meta.end_date,
                    }
                }
            }
        }
    }

    /// Series whose sidecar is older than the given number of days.
    pub fn stale(&self, older_than_days: u64) -> Result<Vec<StoreMeta>, DataError> {
        let cutoff =
            chrono::Local::now().naive_local() - chrono::Duration::days(older_than_days as i64);

        let mut stale = Vec::new();
        for symbol in self.symbols()? {
            for interval in [Interval::Daily, Interval::Weekly, Interval::Monthly] {
                if let Some(meta) = self.get_meta(&symbol, interval) {
                    if meta.stored_at < cutoff {
                        stale.push(meta);
                    }
                }
            }
        }
        Ok(stale)
    }

    /// Remove one symbol+interval series; prunes the symbol directory when
    /// no other series remain.
    pub fn remove(&self, symbol: &str, interval: Interval) -> Result<(), DataError> {
        let dir = self.series_dir(symbol, interval);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| DataError::StoreError(format!("remove series: {e}")))?;
        }

        let sym_dir = self.symbol_dir(symbol);
        if let Ok(mut entries) = fs::read_dir(&sym_dir) {
            if entries.next().is_none() {
                let _ = fs::remove_dir(&sym_dir);
            }
        }

        Ok(())
    }
}

/// Store status for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub symbol: String,
    pub interval: Interval,
    pub stored: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

/// How well the store covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    NotStored,
    Full,
    Partial {
        stored_start: NaiveDate,
        stored_end: NaiveDate,
    },
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Write a DataFrame to a Parquet file.
fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a Parquet file and validate its integrity.
fn load_and_validate_parquet(path: &Path) -> Result<Vec<OhlcvBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }

    BarSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;

    frame_to_bars(&df).map_err(|e| DataError::ParquetError(e.to_string()))
}
