//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[0] = close[0]. No bias adjustment, no warmup gap.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    /// Values are defined from the first bar, but they only reflect roughly
    /// `period` bars of history after that many bars have been seen.
    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// EMA of an arbitrary series.
///
/// A NaN input taints its own position and every later one.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n == 0 || period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[0];
    result[0] = prev;

    for i in 1..n {
        if prev.is_nan() || values[i].is_nan() {
            // result is already NaN from here on
            return result;
        }
        let ema = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = ema;
        prev = ema;
    }

    result
}
