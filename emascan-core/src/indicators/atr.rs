//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|); the first bar
//! has no previous close and uses high-low alone.
//! ATR is a simple trailing mean of True Range over `period` bars, so the first
//! defined value sits at index period-1.

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series.
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let (h, l) = (bar.high, bar.low);
        if h.is_nan() || l.is_nan() {
            tr.push(f64::NAN);
            continue;
        }
        let value = match i.checked_sub(1).map(|p| bars[p].close) {
            Some(pc) if !pc.is_nan() => (h - l).max((h - pc).abs()).max((l - pc).abs()),
            Some(_) => f64::NAN,
            None => h - l,
        };
        tr.push(value);
    }

    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        rolling_mean(&true_range(bars), self.period)
    }
}
