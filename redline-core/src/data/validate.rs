//! Bar canonicalization: sort, dedupe, and drop invalid rows before storage.
//!
//! Providers return raw bars in whatever order and quality the feed had.
//! Canonicalization produces a clean ascending series: duplicate dates keep
//! the first occurrence, rows with non-finite or non-positive prices or
//! inconsistent OHLC bounds are dropped and counted.

use super::provider::{DataError, OhlcvBar};

/// Outcome of canonicalizing a batch of bars.
#[derive(Debug)]
pub struct ValidationReport {
    /// Clean bars, sorted by date ascending, one per date.
    pub accepted: Vec<OhlcvBar>,
    /// Rows dropped for failing the validity predicate.
    pub dropped_invalid: usize,
    /// Rows dropped as duplicate dates (first occurrence wins).
    pub dropped_duplicates: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_invalid == 0 && self.dropped_duplicates == 0
    }
}

/// Validity predicate for a single bar.
fn is_valid(bar: &OhlcvBar) -> bool {
    let prices = [bar.open, bar.high, bar.low, bar.close, bar.adj_close];
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return false;
    }
    bar.high >= bar.low
        && bar.open >= bar.low
        && bar.open <= bar.high
        && bar.close >= bar.low
        && bar.close <= bar.high
}

/// Canonicalize a batch of provider bars.
///
/// Fails if the input is empty or if every row is dropped.
pub fn canonicalize(mut bars: Vec<OhlcvBar>) -> Result<ValidationReport, DataError> {
    if bars.is_empty() {
        return Err(DataError::ValidationError("no bars to validate".into()));
    }

    let total = bars.len();

    // Stable sort so "first occurrence wins" is well defined for duplicates
    bars.sort_by_key(|b| b.date);

    let mut accepted: Vec<OhlcvBar> = Vec::with_capacity(total);
    let mut dropped_invalid = 0;
    let mut dropped_duplicates = 0;

    for bar in bars {
        if !is_valid(&bar) {
            dropped_invalid += 1;
            continue;
        }
        if accepted.last().is_some_and(|prev| prev.date == bar.date) {
            dropped_duplicates += 1;
            continue;
        }
        accepted.push(bar);
    }

    if accepted.is_empty() {
        return Err(DataError::ValidationError(format!(
            "all {total} bars dropped during validation"
        )));
    }

    Ok(ValidationReport {
        accepted,
        dropped_invalid,
        dropped_duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
            adj_close: close,
        }
    }

    #[test]
    fn sorts_by_date() {
        let report = canonicalize(vec![bar(2024, 1, 3, 102.0), bar(2024, 1, 2, 101.0)]).unwrap();
        assert_eq!(report.accepted[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(report.is_clean());
    }

    #[test]
    fn duplicate_dates_keep_first() {
        let mut second = bar(2024, 1, 2, 200.0);
        second.volume = 9999;
        let report = canonicalize(vec![bar(2024, 1, 2, 101.0), second]).unwrap();
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].close, 101.0);
        assert_eq!(report.dropped_duplicates, 1);
    }

    #[test]
    fn drops_nonpositive_prices() {
        let mut bad = bar(2024, 1, 3, 102.0);
        bad.low = 0.0;
        let report = canonicalize(vec![bar(2024, 1, 2, 101.0), bad]).unwrap();
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.dropped_invalid, 1);
    }

    #[test]
    fn drops_nan_prices() {
        let mut bad = bar(2024, 1, 3, 102.0);
        bad.open = f64::NAN;
        let report = canonicalize(vec![bar(2024, 1, 2, 101.0), bad]).unwrap();
        assert_eq!(report.dropped_invalid, 1);
    }

    #[test]
    fn drops_inverted_high_low() {
        let mut bad = bar(2024, 1, 3, 102.0);
        bad.high = bad.low - 1.0;
        let report = canonicalize(vec![bar(2024, 1, 2, 101.0), bad]).unwrap();
        assert_eq!(report.dropped_invalid, 1);
    }

    #[test]
    fn empty_input_errors() {
        assert!(canonicalize(vec![]).is_err());
    }

    #[test]
    fn all_dropped_errors() {
        let mut bad = bar(2024, 1, 2, 101.0);
        bad.close = -5.0;
        assert!(canonicalize(vec![bad]).is_err());
    }

    proptest! {
        /// For any batch of well-formed bars, output dates are strictly increasing
        /// and every accepted bar passed the validity predicate.
        #[test]
        fn accepted_is_strictly_ascending(
            offsets in proptest::collection::vec(0u32..500, 1..50),
            closes in proptest::collection::vec(1.0f64..1000.0, 50),
        ) {
            let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let bars: Vec<OhlcvBar> = offsets
                .iter()
                .zip(closes.iter())
                .map(|(&off, &close)| {
                    let mut b = bar(2020, 1, 1, close);
                    b.date = base + chrono::Duration::days(off as i64);
                    b
                })
                .collect();

            let report = canonicalize(bars).unwrap();
            for pair in report.accepted.windows(2) {
                prop_assert!(pair[0].date < pair[1].date);
            }
        }
    }
}
