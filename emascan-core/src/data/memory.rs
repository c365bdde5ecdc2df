//! In-memory price source for tests and offline runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::provider::{DataError, DateRange, PriceSource};
use crate::domain::{PriceSeries, Timeframe};

/// Serves pre-built series keyed by (symbol, timeframe).
///
/// A series registered for `Daily` also answers intraday requests unless a
/// dedicated intraday series is registered.
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    series: HashMap<(String, Timeframe), PriceSeries>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, timeframe: Timeframe, series: PriceSeries) -> Self {
        self.insert(timeframe, series);
        self
    }

    /// Every fetch for `symbol` fails with a network error.
    pub fn with_failure(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn insert(&mut self, timeframe: Timeframe, series: PriceSeries) {
        self.series
            .insert((series.symbol().to_string(), timeframe), series);
    }

    /// Number of `fetch` calls served so far, failures included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl PriceSource for StaticPriceSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<PriceSeries, DataError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(symbol) {
            return Err(DataError::NetworkUnreachable(format!(
                "simulated failure for {symbol}"
            )));
        }
        let series = self
            .series
            .get(&(symbol.to_string(), timeframe))
            .or_else(|| self.series.get(&(symbol.to_string(), Timeframe::Daily)))
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        let bars = series
            .bars()
            .iter()
            .copied()
            .filter(|bar| range.contains(bar.date))
            .collect();
        Ok(PriceSeries::from_unsorted(symbol, bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceBar;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        }
    }

    #[test]
    fn filters_by_range_and_falls_back_to_daily() {
        let series = PriceSeries::new("ITC", vec![bar(1, 10.0), bar(4, 11.0), bar(5, 12.0)]).unwrap();
        let source = StaticPriceSource::new().with_series(Timeframe::Daily, series);
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let got = source
            .fetch("ITC", Timeframe::OneHour, DateRange::single(day))
            .unwrap();
        assert_eq!(got.closes(), vec![11.0]);
        assert_eq!(source.latest_close("ITC", day).unwrap(), Some(11.0));
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn unknown_and_failing_symbols() {
        let source = StaticPriceSource::new().with_failure("BAD");
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(matches!(
            source.fetch("BAD", Timeframe::Daily, DateRange::single(day)),
            Err(DataError::NetworkUnreachable(_))
        ));
        assert!(matches!(
            source.fetch("NOPE", Timeframe::Daily, DateRange::single(day)),
            Err(DataError::SymbolNotFound { .. })
        ));
    }
}
