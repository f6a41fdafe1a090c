//! Alpha Vantage data provider.
//!
//! Fetches adjusted OHLCV series from the Alpha Vantage REST API. Requires an
//! API key (free tier: 25 requests/day, 5 requests/minute). Rate-limit and
//! error conditions arrive as JSON payloads with HTTP 200, so parsing has to
//! inspect the body before the series.
//!
//! The API returns the full history; bars are filtered to the requested date
//! range client-side.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    DataError, DataSource, FetchResult, Interval, MarketDataProvider, OhlcvBar,
};
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Alpha Vantage data provider.
#[derive(Debug)]
pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    api_key: String,
    max_retries: u32,
    base_delay: Duration,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            circuit_breaker,
            api_key: api_key.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Construct from an optional configured key, resolved once at startup.
    pub fn from_key(
        api_key: Option<String>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        match api_key {
            Some(key) if !key.is_empty() => Ok(Self::new(key, circuit_breaker)),
            _ => Err(DataError::MissingApiKey {
                provider: "alpha_vantage",
            }),
        }
    }

    /// API function name for the interval.
    fn function_for(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "TIME_SERIES_DAILY_ADJUSTED",
            Interval::Weekly => "TIME_SERIES_WEEKLY_ADJUSTED",
            Interval::Monthly => "TIME_SERIES_MONTHLY_ADJUSTED",
        }
    }

    /// Top-level JSON key holding the series for the interval.
    fn series_key_for(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "Time Series (Daily)",
            Interval::Weekly => "Weekly Adjusted Time Series",
            Interval::Monthly => "Monthly Adjusted Time Series",
        }
    }

    fn query_url(&self, symbol: &str, interval: Interval) -> String {
        let function = Self::function_for(interval);
        let key = &self.api_key;
        format!(
            "https://www.alphavantage.co/query\
             ?function={function}&symbol={symbol}&outputsize=full&apikey={key}"
        )
    }

    /// Parse a series payload. Field names carry Alpha Vantage's numeric
    /// prefixes ("1. open", "5. adjusted close", "6. volume").
    fn parse_payload(
        symbol: &str,
        interval: Interval,
        payload: &Value,
    ) -> Result<Vec<OhlcvBar>, DataError> {
        if payload.get("Note").is_some() || payload.get("Information").is_some() {
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
            });
        }
        if payload.get("Error Message").is_some() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let series = payload
            .get(Self::series_key_for(interval))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("no series object for {symbol}"))
            })?;

        let mut bars = Vec::with_capacity(series.len());
        for (date_str, fields) in series {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad date '{date_str}': {e}"))
            })?;

            bars.push(OhlcvBar {
                date,
                open: field_f64(fields, "1. open")?,
                high: field_f64(fields, "2. high")?,
                low: field_f64(fields, "3. low")?,
                close: field_f64(fields, "4. close")?,
                volume: field_f64(fields, "6. volume")? as u64,
                adj_close: field_f64(fields, "5. adjusted close")?,
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        bars.sort_by_key(|b| b.date);
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

        let url = self.query_url(symbol, interval);
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

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::AuthenticationRequired(
                            "Alpha Vantage rejected the API key".into(),
                        ));
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let payload: Value = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    match Self::parse_payload(symbol, interval, &payload) {
                        Ok(bars) => {
                            self.circuit_breaker.record_success();
                            let filtered: Vec<OhlcvBar> = bars
                                .into_iter()
                                .filter(|b| b.date >= start && b.date <= end)
                                .collect();
                            if filtered.is_empty() {
                                return Err(DataError::SymbolNotFound {
                                    symbol: symbol.to_string(),
                                });
                            }
                            return Ok(filtered);
                        }
                        Err(e @ DataError::RateLimited { .. }) => {
                            self.circuit_breaker.record_failure();
                            last_error = Some(e);
                            continue;
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

fn field_f64(fields: &Value, name: &str) -> Result<f64, DataError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("missing or bad field '{name}'")))
}

impl MarketDataProvider for AlphaVantageProvider {
    fn name(&self) -> &'static str {
        "alpha_vantage"
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
            source: DataSource::AlphaVantage,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(body: &str) -> Value {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn parses_daily_series() {
        let v = payload(
            r#"{"Meta Data":{"2. Symbol":"SPY"},
                "Time Series (Daily)":{
                  "2024-01-03":{"1. open":"101.0","2. high":"103.0","3. low":"100.0",
                    "4. close":"102.0","5. adjusted close":"101.5","6. volume":"1100"},
                  "2024-01-02":{"1. open":"100.0","2. high":"102.0","3. low":"99.0",
                    "4. close":"101.0","5. adjusted close":"100.5","6. volume":"1000"}}}"#,
        );

        let bars = AlphaVantageProvider::parse_payload("SPY", Interval::Daily, &v).unwrap();
        assert_eq!(bars.len(), 2);
        // Sorted ascending regardless of JSON object order
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].adj_close, 100.5);
        assert_eq!(bars[1].volume, 1100);
    }

    #[test]
    fn note_payload_is_rate_limited() {
        let v = payload(r#"{"Note":"Thank you for using Alpha Vantage!"}"#);
        let err = AlphaVantageProvider::parse_payload("SPY", Interval::Daily, &v).unwrap_err();
        assert!(matches!(err, DataError::RateLimited { .. }));
    }

    #[test]
    fn error_message_is_symbol_not_found() {
        let v = payload(r#"{"Error Message":"Invalid API call"}"#);
        let err = AlphaVantageProvider::parse_payload("NOSUCH", Interval::Daily, &v).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn missing_series_is_format_changed() {
        let v = payload(r#"{"Meta Data":{}}"#);
        let err = AlphaVantageProvider::parse_payload("SPY", Interval::Daily, &v).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn weekly_uses_weekly_series_key() {
        let v = payload(
            r#"{"Weekly Adjusted Time Series":{
                  "2024-01-05":{"1. open":"100.0","2. high":"102.0","3. low":"99.0",
                    "4. close":"101.0","5. adjusted close":"100.5","6. volume":"5000"}}}"#,
        );

        let bars = AlphaVantageProvider::parse_payload("SPY", Interval::Weekly, &v).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn from_key_requires_a_key() {
        let cb = Arc::new(CircuitBreaker::default_provider());
        let err = AlphaVantageProvider::from_key(None, cb.clone()).unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingApiKey {
                provider: "alpha_vantage"
            }
        ));
        assert!(AlphaVantageProvider::from_key(Some("demo".into()), cb).is_ok());
    }
}
