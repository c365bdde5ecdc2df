//! Price bars and the date-ordered series the scanner evaluates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daily OHLCV bar for a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// True when the bar closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bars for {symbol} are not strictly increasing at {date}")]
    NotIncreasing { symbol: String, date: NaiveDate },
}

/// Ordered bar history for one instrument.
///
/// Dates are strictly increasing. Gaps (holidays, weekends) are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from bars that must already be in strictly increasing date order.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(SeriesError::NotIncreasing {
                symbol,
                date: w[1].date,
            });
        }
        Ok(Self { symbol, bars })
    }

    /// Build a series from provider output in any order.
    ///
    /// Bars are sorted by date; when a date repeats, the last bar seen wins.
    pub fn from_unsorted(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        // stable sort keeps arrival order within a date, so dedup keeps the later one
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Close of the most recent bar, if it is a number.
    pub fn latest_close(&self) -> Option<f64> {
        self.latest().map(|b| b.close).filter(|c| !c.is_nan())
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 10_000,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(bar(2, 100.0).is_sane());
        assert!(bar(2, 100.0).is_bullish());
    }

    #[test]
    fn bar_detects_void() {
        let mut b = bar(2, 100.0);
        b.low = f64::NAN;
        assert!(b.is_void());
        assert!(!b.is_sane());
    }

    #[test]
    fn new_rejects_out_of_order_dates() {
        let err = PriceSeries::new("INFY", vec![bar(3, 100.0), bar(2, 101.0)]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NotIncreasing {
                symbol: "INFY".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            }
        );
    }

    #[test]
    fn new_rejects_duplicate_dates() {
        assert!(PriceSeries::new("INFY", vec![bar(2, 100.0), bar(2, 101.0)]).is_err());
    }

    #[test]
    fn from_unsorted_sorts_and_keeps_last_duplicate() {
        let series =
            PriceSeries::from_unsorted("TCS", vec![bar(4, 104.0), bar(2, 102.0), bar(4, 99.0)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, 102.0);
        assert_eq!(series.latest_close(), Some(99.0));
    }

    #[test]
    fn latest_close_ignores_nan() {
        let mut b = bar(2, 100.0);
        b.close = f64::NAN;
        let series = PriceSeries::new("X", vec![b]).unwrap();
        assert_eq!(series.latest_close(), None);
        assert_eq!(PriceSeries::empty("X").latest_close(), None);
    }
}
