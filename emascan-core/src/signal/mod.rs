//! Breakout signal evaluation.
//!
//! The rule looks at the two most recent bars of a series:
//! - trend: EMA-short > EMA-medium > EMA-long, and EMA-short rose across the
//!   trailing trend window
//! - proximity: the previous close sits inside the tolerance band around the
//!   latest EMA-short (the pullback)
//! - momentum: the latest bar is bullish with a body above the threshold
//!
//! When all three hold, one `Signal` is produced with the stop at the lowest
//! low of the trailing stop window and targets at close + 1/2/3 ATR.
//!
//! Every comparison involving a NaN is false, so undefined indicator values
//! (e.g. ATR on a short series) can never produce a signal.

use chrono::NaiveDateTime;

use crate::config::StrategyParams;
use crate::domain::{PriceBar, PriceSeries, Signal};
use crate::indicators::IndicatorSet;

/// Which of the three breakout conditions held on the latest bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionReport {
    pub trend: bool,
    pub proximity: bool,
    pub momentum: bool,
}

impl ConditionReport {
    pub fn all(&self) -> bool {
        self.trend && self.proximity && self.momentum
    }
}

/// Outcome of evaluating one series under one strategy label.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Too few bars to evaluate; not an error.
    InsufficientHistory { bars: usize, required: usize },
    NoSignal(ConditionReport),
    Signal(Signal),
}

impl Evaluation {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Evaluation::Signal(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Evaluation::Signal(s) => Some(s),
            _ => None,
        }
    }
}

/// Applies the EMA pullback breakout rule. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct BreakoutEvaluator {
    params: StrategyParams,
}

impl BreakoutEvaluator {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Evaluate the latest bar of `series`.
    ///
    /// `emitted_at` is stamped on the signal when one fires.
    pub fn evaluate(
        &self,
        series: &PriceSeries,
        strategy_label: &str,
        emitted_at: NaiveDateTime,
    ) -> Evaluation {
        // never evaluate fewer than two bars, whatever min_candles says
        let required = self.params.min_candles.max(2);
        if series.len() < required {
            return Evaluation::InsufficientHistory {
                bars: series.len(),
                required,
            };
        }

        let bars = series.bars();
        let indicators = IndicatorSet::compute(bars, &self.params);
        let report = self.conditions(bars, &indicators);
        if !report.all() {
            return Evaluation::NoSignal(report);
        }

        match self.levels(bars, &indicators) {
            Some((stop_loss, [target1, target2, target3])) => Evaluation::Signal(Signal {
                instrument: series.symbol().to_string(),
                price: bars[bars.len() - 1].close,
                strategy_label: strategy_label.to_string(),
                stop_loss,
                target1,
                target2,
                target3,
                emitted_at,
            }),
            None => Evaluation::NoSignal(report),
        }
    }

    /// Check the three conditions on the latest bar.
    ///
    /// `bars` and `indicators` must be aligned and hold at least two bars.
    pub fn conditions(&self, bars: &[PriceBar], indicators: &IndicatorSet) -> ConditionReport {
        let n = bars.len();
        if n < 2 || indicators.len() != n {
            return ConditionReport::default();
        }
        let latest = &bars[n - 1];
        let prev = &bars[n - 2];
        let ema_short = indicators.ema_short[n - 1];

        ConditionReport {
            trend: self.trend_ok(indicators),
            proximity: self.near_ema(prev.close, ema_short),
            momentum: self.strong_green(latest),
        }
    }

    fn trend_ok(&self, ind: &IndicatorSet) -> bool {
        let n = ind.len();
        let window = self.params.trend_lookback;
        if window == 0 || n < window {
            return false;
        }
        let short = ind.ema_short[n - 1];
        let medium = ind.ema_medium[n - 1];
        let long = ind.ema_long[n - 1];
        // reference is the first bar of the trailing window
        let reference = ind.ema_short[n - window];
        if reference == 0.0 {
            return false;
        }
        let change = (short - reference) / reference;

        short > medium && medium > long && change > 0.0
    }

    fn near_ema(&self, prev_close: f64, ema_short: f64) -> bool {
        let tol = self.params.ema_tolerance;
        prev_close >= ema_short * (1.0 - tol) && prev_close <= ema_short * (1.0 + tol)
    }

    fn strong_green(&self, bar: &PriceBar) -> bool {
        bar.open > 0.0
            && bar.is_bullish()
            && (bar.close - bar.open) / bar.open > self.params.strong_green_pct
    }

    /// Stop-loss and targets for a qualifying latest bar.
    ///
    /// None if any value in the stop window is NaN, ATR is undefined or not
    /// positive, or the levels are not strictly ordered.
    fn levels(&self, bars: &[PriceBar], ind: &IndicatorSet) -> Option<(f64, [f64; 3])> {
        let n = bars.len();
        let window = self.params.stop_lookback.min(n);
        if window == 0 {
            return None;
        }
        let mut stop = f64::INFINITY;
        for bar in &bars[n - window..] {
            if bar.low.is_nan() {
                return None;
            }
            stop = stop.min(bar.low);
        }

        let close = bars[n - 1].close;
        let atr = ind.atr[n - 1];
        if !(atr > 0.0 && atr.is_finite() && close.is_finite()) {
            return None;
        }
        let targets = [close + atr, close + 2.0 * atr, close + 3.0 * atr];
        let ordered = targets[0] < targets[1] && targets[1] < targets[2];
        ordered.then_some((stop, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use crate::indicators::{assert_approx, make_bars};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(15, 45, 0)
            .unwrap()
    }

    fn small_params() -> StrategyParams {
        StrategyParams {
            ema_short: 5,
            ema_medium: 10,
            ema_long: 20,
            atr_period: 3,
            min_candles: 30,
            ..StrategyParams::default()
        }
    }

    /// Steady uptrend, a shallow pullback onto EMA-short, then a strong green bar.
    fn pullback_then_breakout() -> Vec<PriceBar> {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        // pullback: previous close just under the last rising close
        closes.push(137.5);
        let mut bars = make_bars(&closes);
        let prev_close = bars.last().unwrap().close;
        let date = bars.last().unwrap().date + chrono::Duration::days(1);
        bars.push(PriceBar {
            date,
            open: prev_close,
            high: prev_close * 1.03,
            low: prev_close - 0.5,
            close: prev_close * 1.02,
            volume: 5000,
        });
        bars
    }

    #[test]
    fn short_series_is_skipped() {
        let evaluator = BreakoutEvaluator::new(StrategyParams::default());
        let series = PriceSeries::new("ITC", make_bars(&[100.0; 59])).unwrap();
        assert_eq!(
            evaluator.evaluate(&series, "EMA50 Daily", now()),
            Evaluation::InsufficientHistory {
                bars: 59,
                required: 60
            }
        );
    }

    #[test]
    fn engineered_breakout_emits_one_signal() {
        let evaluator = BreakoutEvaluator::new(small_params());
        let bars = pullback_then_breakout();
        let series = PriceSeries::new("TCS", bars.clone()).unwrap();
        let label = Timeframe::Daily.strategy_label(5);

        let evaluation = evaluator.evaluate(&series, &label, now());
        let signal = evaluation.signal().expect("breakout should fire");

        let n = bars.len();
        let latest = bars[n - 1];
        let expected_stop = bars[n - 5..]
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min);
        let atr = IndicatorSet::compute(&bars, &small_params()).atr[n - 1];

        assert_eq!(signal.instrument, "TCS");
        assert_eq!(signal.strategy_label, "EMA5 Daily");
        assert_eq!(signal.emitted_at, now());
        assert_approx(signal.price, latest.close, 1e-12);
        assert_approx(signal.stop_loss, expected_stop, 1e-12);
        assert_approx(signal.target1, latest.close + atr, 1e-9);
        assert_approx(signal.target2, latest.close + 2.0 * atr, 1e-9);
        assert_approx(signal.target3, latest.close + 3.0 * atr, 1e-9);
        assert!(signal.stop_loss < signal.price);
        assert!(signal.price < signal.target1);
        assert!(signal.target1 < signal.target2 && signal.target2 < signal.target3);
    }

    #[test]
    fn runaway_rally_fails_proximity() {
        // Every close far above EMA-short: trend and momentum hold, proximity does not.
        let closes: Vec<f64> = (0..80).map(|i| 100.0 * 1.08f64.powi(i)).collect();
        let mut bars = make_bars(&closes);
        let last = bars.len() - 1;
        bars[last].open = bars[last].close / 1.05;

        let evaluator = BreakoutEvaluator::new(small_params());
        let series = PriceSeries::new("ADANIENT", bars).unwrap();
        match evaluator.evaluate(&series, "EMA5 Daily", now()) {
            Evaluation::NoSignal(report) => {
                assert!(report.trend);
                assert!(report.momentum);
                assert!(!report.proximity);
            }
            other => panic!("expected NoSignal, got {other:?}"),
        }
    }

    #[test]
    fn bearish_latest_bar_fails_momentum() {
        let mut bars = pullback_then_breakout();
        let last = bars.len() - 1;
        let bar = &mut bars[last];
        std::mem::swap(&mut bar.open, &mut bar.close);
        let series = PriceSeries::new("TCS", bars).unwrap();
        let evaluation = BreakoutEvaluator::new(small_params()).evaluate(&series, "x", now());
        assert!(matches!(evaluation, Evaluation::NoSignal(r) if !r.momentum));
    }

    #[test]
    fn tiny_body_fails_momentum() {
        let mut bars = pullback_then_breakout();
        let last = bars.len() - 1;
        bars[last].close = bars[last].open * 1.004;
        let series = PriceSeries::new("TCS", bars).unwrap();
        let evaluation = BreakoutEvaluator::new(small_params()).evaluate(&series, "x", now());
        assert!(evaluation.signal().is_none());
    }

    #[test]
    fn falling_market_fails_trend() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let series = PriceSeries::new("YESBANK", make_bars(&closes)).unwrap();
        let evaluation = BreakoutEvaluator::new(small_params()).evaluate(&series, "x", now());
        assert!(matches!(evaluation, Evaluation::NoSignal(r) if !r.trend));
    }

    #[test]
    fn undefined_atr_never_signals() {
        // ATR period longer than the series: every other condition holds, ATR is NaN.
        let params = StrategyParams {
            atr_period: 500,
            ..small_params()
        };
        let series = PriceSeries::new("TCS", pullback_then_breakout()).unwrap();
        let evaluation = BreakoutEvaluator::new(params).evaluate(&series, "x", now());
        match evaluation {
            Evaluation::NoSignal(report) => assert!(report.all()),
            other => panic!("expected NoSignal, got {other:?}"),
        }
    }

    #[test]
    fn nan_low_in_stop_window_fails_closed() {
        let mut bars = pullback_then_breakout();
        let n = bars.len();
        bars[n - 3].low = f64::NAN;
        let series = PriceSeries::new("TCS", bars).unwrap();
        let evaluation = BreakoutEvaluator::new(small_params()).evaluate(&series, "x", now());
        assert!(evaluation.signal().is_none());
    }

    #[test]
    fn nan_close_fails_closed() {
        let mut bars = pullback_then_breakout();
        let n = bars.len();
        bars[n - 2].close = f64::NAN;
        let series = PriceSeries::new("TCS", bars).unwrap();
        let evaluation = BreakoutEvaluator::new(small_params()).evaluate(&series, "x", now());
        assert_eq!(evaluation.into_signal(), None);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let evaluator = BreakoutEvaluator::new(small_params());
        let series = PriceSeries::new("TCS", pullback_then_breakout()).unwrap();
        assert_eq!(
            evaluator.evaluate(&series, "x", now()),
            evaluator.evaluate(&series, "x", now())
        );
    }
}
