//! Indicator engine.
//!
//! Indicators are pure functions: bar history in, numeric series out, one value
//! per bar. They are recomputed from scratch on every evaluation; nothing is
//! carried between scan cycles. Warmup positions hold `f64::NAN`.

pub mod atr;
pub mod ema;
pub mod rolling;

pub use atr::{true_range, Atr};
pub use ema::{ema_of_series, Ema};
pub use rolling::rolling_mean;

use crate::config::StrategyParams;
use crate::domain::PriceBar;

/// Trait for indicators.
///
/// `compute` returns a `Vec<f64>` of the same length as `bars`. No value at
/// index t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_50", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading bars whose output is not yet meaningful.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64>;
}

/// Indicator series aligned index-for-index with a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub ema_short: Vec<f64>,
    pub ema_medium: Vec<f64>,
    pub ema_long: Vec<f64>,
    pub atr: Vec<f64>,
}

impl IndicatorSet {
    pub fn compute(bars: &[PriceBar], params: &StrategyParams) -> Self {
        Self {
            ema_short: Ema::new(params.ema_short).compute(bars),
            ema_medium: Ema::new(params.ema_medium).compute(bars),
            ema_long: Ema::new(params.ema_long).compute(bars),
            atr: Atr::new(params.atr_period).compute(bars),
        }
    }

    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_short.is_empty()
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
