//! Stooq data provider.
//!
//! Fetches OHLCV history from stooq.com's CSV download endpoint. Stooq needs
//! no API key but enforces a daily hit limit; once exceeded it returns a
//! plain-text sentinel instead of CSV. Symbols use Stooq's own form (US
//! tickers carry a `.us` suffix, e.g. `spy.us`).
//!
//! The feed has no adjusted close; `adj_close` mirrors `close`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    DataError, DataSource, FetchResult, Interval, MarketDataProvider, OhlcvBar,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const HIT_LIMIT_SENTINEL: &str = "Exceeded the daily hits limit";
const NO_DATA_SENTINEL: &str = "No data";

/// One row of Stooq's CSV payload. Volume is absent for indices.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume", default)]
    volume: Option<f64>,
}

/// Stooq data provider.
pub struct StooqProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl StooqProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Stooq's interval token for the download endpoint.
    fn interval_token(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "d",
            Interval::Weekly => "w",
            Interval::Monthly => "m",
        }
    }

    /// Build the CSV download URL. Dates are formatted as YYYYMMDD.
    fn csv_url(symbol: &str, start: NaiveDate, end: NaiveDate, interval: Interval) -> String {
        let s = symbol.to_lowercase();
        let d1 = start.format("%Y%m%d");
        let d2 = end.format("%Y%m%d");
        let i = Self::interval_token(interval);
        format!("https://stooq.com/q/d/l/?s={s}&d1={d1}&d2={d2}&i={i}")
    }

    /// Parse the CSV payload, detecting Stooq's plain-text sentinels first.
    fn parse_csv(symbol: &str, text: &str) -> Result<Vec<OhlcvBar>, DataError> {
        let trimmed = text.trim();
        if trimmed.contains(HIT_LIMIT_SENTINEL) {
            // The limit resets daily
            return Err(DataError::RateLimited {
                retry_after_secs: 24 * 60 * 60,
            });
        }
        if trimmed.is_empty() || trimmed.starts_with(NO_DATA_SENTINEL) {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(trimmed.as_bytes());

        let mut bars = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record.map_err(|e| {
                DataError::ResponseFormatChanged(format!("CSV row for {symbol}: {e}"))
            })?;
            bars.push(OhlcvBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.unwrap_or(0.0) as u64,
                adj_close: row.close,
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::csv_url(symbol, start, end, interval);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let text = resp.text().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to read response for {symbol}: {e}"
                        ))
                    })?;

                    match Self::parse_csv(symbol, &text) {
                        Ok(bars) => {
                            self.circuit_breaker.record_success();
                            return Ok(bars);
                        }
                        Err(e @ DataError::RateLimited { .. }) => {
                            // Hit limit is account-wide; stop retrying this batch
                            self.circuit_breaker.record_failure();
                            return Err(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataProvider for StooqProvider {
    fn name(&self) -> &'static str {
        "stooq"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, start, end, interval)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            interval,
            bars,
            source: DataSource::Stooq,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_payload() {
        let csv = "Date,Open,High,Low,Close,Volume\n\
                   2024-01-02,100.0,102.0,99.0,101.0,1000\n\
                   2024-01-03,101.0,103.0,100.0,102.0,1100\n";

        let bars = StooqProvider::parse_csv("spy.us", csv).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].volume, 1000);
        assert_eq!(bars[1].adj_close, 102.0); // mirrors close
    }

    #[test]
    fn index_rows_without_volume() {
        let csv = "Date,Open,High,Low,Close\n\
                   2024-01-02,4700.0,4720.0,4690.0,4710.0\n";

        let bars = StooqProvider::parse_csv("^spx", csv).unwrap();
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn hit_limit_sentinel_is_rate_limited() {
        let err = StooqProvider::parse_csv("spy.us", "Exceeded the daily hits limit").unwrap_err();
        assert!(matches!(err, DataError::RateLimited { .. }));
    }

    #[test]
    fn no_data_sentinel_is_symbol_not_found() {
        let err = StooqProvider::parse_csv("nosuch.us", "No data").unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn empty_body_is_symbol_not_found() {
        let err = StooqProvider::parse_csv("nosuch.us", "").unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn csv_url_lowercases_and_formats_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let url = StooqProvider::csv_url("SPY.US", start, end, Interval::Daily);
        assert!(url.contains("s=spy.us"));
        assert!(url.contains("d1=20240102"));
        assert!(url.contains("d2=20240304"));
        assert!(url.contains("i=d"));
    }
}
