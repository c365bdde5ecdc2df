//! Price source trait and structured error types.
//!
//! `PriceSource` abstracts over where bars come from (NSE, in-memory fixtures)
//! so the scanner and monitor can be driven by fakes in tests.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{PriceSeries, Timeframe};

/// Structured error types for data operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("session rejected by provider: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{timeframe} bars are not served by {provider}")]
    UnsupportedTimeframe {
        provider: String,
        timeframe: Timeframe,
    },

    #[error("universe error: {0}")]
    Universe(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A single trading day.
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Trait for historical price providers.
///
/// Implementations own transport concerns (sessions, retries, timeouts). The
/// scanner and monitor treat any `Err` as "no data for this instrument".
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for `symbol` at `timeframe` over `range`.
    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<PriceSeries, DataError>;

    /// Fetch every requested timeframe for one instrument.
    ///
    /// The default issues one `fetch` per timeframe. Providers that alias
    /// several timeframes onto one underlying series override this to fetch once.
    fn fetch_timeframes(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        range: DateRange,
    ) -> Vec<(Timeframe, Result<PriceSeries, DataError>)> {
        timeframes
            .iter()
            .map(|&tf| (tf, self.fetch(symbol, tf, range)))
            .collect()
    }

    /// Last daily close on `day`. `Ok(None)` when the day has no bar yet.
    fn latest_close(&self, symbol: &str, day: NaiveDate) -> Result<Option<f64>, DataError> {
        let series = self.fetch(symbol, Timeframe::Daily, DateRange::single(day))?;
        Ok(series.latest_close())
    }

    /// Whether the provider is currently accepting requests.
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_contains_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let range = DateRange::new(d(5), d(9));
        assert!(range.contains(d(5)));
        assert!(range.contains(d(9)));
        assert!(!range.contains(d(10)));
        assert!(DateRange::single(d(7)).contains(d(7)));
    }

    #[test]
    fn errors_display() {
        let err = DataError::Http {
            status: 503,
            symbol: "SBIN".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503 for SBIN");
        let err = DataError::UnsupportedTimeframe {
            provider: "nse".into(),
            timeframe: Timeframe::OneHour,
        };
        assert_eq!(err.to_string(), "1h bars are not served by nse");
    }
}
