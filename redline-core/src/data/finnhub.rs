//! Finnhub data provider.
//!
//! Fetches OHLCV candles from Finnhub's `/stock/candle` endpoint. Requires an
//! API key. The response carries parallel arrays keyed by single letters
//! (t/o/h/l/c/v) plus a status field. Candles are unadjusted; `adj_close`
//! mirrors `close`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    DataError, DataSource, FetchResult, Interval, MarketDataProvider, OhlcvBar,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Finnhub candle response: parallel arrays plus a status flag.
#[derive(Debug, Deserialize)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

/// Finnhub data provider.
#[derive(Debug)]
pub struct FinnhubProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    api_key: String,
    max_retries: u32,
    base_delay: Duration,
}

impl FinnhubProvider {
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
                provider: "finnhub",
            }),
        }
    }

    /// Finnhub's resolution token.
    fn resolution_token(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "D",
            Interval::Weekly => "W",
            Interval::Monthly => "M",
        }
    }

    fn candle_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate, interval: Interval) -> String {
        let from = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let to = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        let resolution = Self::resolution_token(interval);
        let token = &self.api_key;
        format!(
            "https://finnhub.io/api/v1/stock/candle\
             ?symbol={symbol}&resolution={resolution}&from={from}&to={to}&token={token}"
        )
    }

    /// Parse the candle response into bars.
    fn parse_candles(symbol: &str, resp: CandleResponse) -> Result<Vec<OhlcvBar>, DataError> {
        if resp.s == "no_data" {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if resp.s != "ok" {
            return Err(DataError::ResponseFormatChanged(format!(
                "unexpected status '{}' for {symbol}",
                resp.s
            )));
        }

        let n = resp.t.len();
        if resp.o.len() != n || resp.h.len() != n || resp.l.len() != n || resp.c.len() != n {
            return Err(DataError::ResponseFormatChanged(format!(
                "array length mismatch for {symbol}"
            )));
        }

        let mut bars = Vec::with_capacity(n);
        for i in 0..n {
            let date = chrono::DateTime::from_timestamp(resp.t[i], 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {}", resp.t[i]))
                })?;

            bars.push(OhlcvBar {
                date,
                open: resp.o[i],
                high: resp.h[i],
                low: resp.l[i],
                close: resp.c[i],
                volume: resp.v.get(i).copied().unwrap_or(0.0) as u64,
                adj_close: resp.c[i],
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

        let url = self.candle_url(symbol, start, end, interval);
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
                            "Finnhub rejected the API key".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: 60,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let candles: CandleResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let bars = Self::parse_candles(symbol, candles)?;
                    self.circuit_breaker.record_success();
                    return Ok(bars);
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

impl MarketDataProvider for FinnhubProvider {
    fn name(&self) -> &'static str {
        "finnhub"
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
            source: DataSource::Finnhub,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
