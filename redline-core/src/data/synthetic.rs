//! Synthetic data provider — seeded random walk, no network access.
//!
//! Used for offline development and tests. Bars are deterministic per symbol:
//! the RNG is seeded from a hash of the symbol, so repeated fetches return
//! identical data.

use super::provider::{
    DataError, DataSource, FetchResult, Interval, MarketDataProvider, OhlcvBar,
};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic random-walk data provider.
pub struct SyntheticProvider {
    start_price: f64,
    step_vol: f64,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            start_price: 100.0,
            step_vol: 0.02,
        }
    }

    /// Deterministic RNG seed derived from the symbol.
    fn seed_for(symbol: &str) -> u64 {
        let hash = blake3::hash(symbol.as_bytes());
        let bytes: [u8; 8] = hash.as_bytes()[..8].try_into().unwrap();
        u64::from_le_bytes(bytes)
    }

    /// Bar dates for the requested range and interval.
    ///
    /// Daily bars fall on weekdays; weekly bars step seven days from the
    /// range start; monthly bars fall on the first of each month.
    fn dates_for(start: NaiveDate, end: NaiveDate, interval: Interval) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        match interval {
            Interval::Daily => {
                let mut d = start;
                while d <= end {
                    if d.weekday().number_from_monday() <= 5 {
                        dates.push(d);
                    }
                    d += ChronoDuration::days(1);
                }
            }
            Interval::Weekly => {
                let mut d = start;
                while d <= end {
                    dates.push(d);
                    d += ChronoDuration::days(7);
                }
            }
            Interval::Monthly => {
                let mut d = start;
                while d <= end {
                    if d.day() == 1 {
                        dates.push(d);
                    }
                    d += ChronoDuration::days(1);
                }
            }
        }
        dates
    }

    fn generate(&self, symbol: &str, dates: &[NaiveDate]) -> Vec<OhlcvBar> {
        let mut rng = StdRng::seed_from_u64(Self::seed_for(symbol));
        let mut price = self.start_price;
        let mut bars = Vec::with_capacity(dates.len());

        for &date in dates {
            let drift: f64 = rng.gen_range(-1.0..1.0) * self.step_vol;
            let open = price;
            let close = (price * (1.0 + drift)).max(0.01);
            let spread = rng.gen_range(0.0..self.step_vol) * price;
            let high = open.max(close) + spread;
            let low = (open.min(close) - spread).max(0.01);
            let volume = rng.gen_range(1_000_000..5_000_000);

            bars.push(OhlcvBar {
                date,
                open,
                high,
                low,
                close,
                volume,
                adj_close: close,
            });
            price = close;
        }

        bars
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        if end < start {
            return Err(DataError::Other(format!(
                "end date {end} precedes start date {start}"
            )));
        }

        let dates = Self::dates_for(start, end, interval);
        if dates.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok(FetchResult {
            symbol: symbol.to_string(),
            interval,
            bars: self.generate(symbol, &dates),
            source: DataSource::Synthetic,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn deterministic_per_symbol() {
        let provider = SyntheticProvider::new();
        let a = provider
            .fetch("SPY", date(2024, 1, 1), date(2024, 3, 1), Interval::Daily)
            .unwrap();
        let b = provider
            .fetch("SPY", date(2024, 1, 1), date(2024, 3, 1), Interval::Daily)
            .unwrap();
        assert_eq!(a.bars, b.bars);
    }

    #[test]
    fn different_symbols_differ() {
        let provider = SyntheticProvider::new();
        let a = provider
            .fetch("SPY", date(2024, 1, 1), date(2024, 3, 1), Interval::Daily)
            .unwrap();
        let b = provider
            .fetch("QQQ", date(2024, 1, 1), date(2024, 3, 1), Interval::Daily)
            .unwrap();
        assert_ne!(a.bars, b.bars);
    }

    #[test]
    fn daily_bars_skip_weekends() {
        let provider = SyntheticProvider::new();
        let result = provider
            .fetch("SPY", date(2024, 1, 1), date(2024, 1, 14), Interval::Daily)
            .unwrap();
        for bar in &result.bars {
            assert!(bar.date.weekday().number_from_monday() <= 5);
        }
        assert_eq!(result.bars.len(), 10); // two full trading weeks
    }

    #[test]
    fn monthly_bars_fall_on_month_start() {
        let provider = SyntheticProvider::new();
        let result = provider
            .fetch("SPY", date(2024, 1, 1), date(2024, 6, 30), Interval::Monthly)
            .unwrap();
        assert_eq!(result.bars.len(), 6);
        for bar in &result.bars {
            assert_eq!(bar.date.day(), 1);
        }
    }

    #[test]
    fn bars_satisfy_ohlc_ordering() {
        let provider = SyntheticProvider::new();
        let result = provider
            .fetch("SPY", date(2024, 1, 1), date(2024, 12, 31), Interval::Daily)
            .unwrap();
        for bar in &result.bars {
            assert!(bar.high >= bar.low);
            assert!(bar.open >= bar.low && bar.open <= bar.high);
            assert!(bar.close >= bar.low && bar.close <= bar.high);
            assert!(bar.low > 0.0);
        }
    }

    #[test]
    fn inverted_range_is_an_error() {
        let provider = SyntheticProvider::new();
        let err = provider
            .fetch("SPY", date(2024, 2, 1), date(2024, 1, 1), Interval::Daily)
            .unwrap_err();
        assert!(matches!(err, DataError::Other(_)));
    }
}
