#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use emascan_core::config::{ScanSettings, StrategyParams};
use emascan_core::data::{DataError, PriceSource, StaticUniverse, UniverseProvider};
use emascan_core::domain::{PriceBar, PriceSeries, Signal};
use emascan_core::notify::Notifier;
use emascan_core::store::SignalTable;
use emascan_runner::CycleDriver;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn cycle_time() -> NaiveDateTime {
    today().and_hms_opt(15, 45, 0).unwrap()
}

/// Short periods so fixtures stay small: EMA 5/10/20, ATR 3, 30 bars minimum.
pub fn small_params() -> StrategyParams {
    StrategyParams {
        ema_short: 5,
        ema_medium: 10,
        ema_long: 20,
        atr_period: 3,
        min_candles: 30,
        ..StrategyParams::default()
    }
}

pub fn settings(max_workers: usize) -> ScanSettings {
    ScanSettings {
        max_workers,
        batch_delay_ms: 0,
        history_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ..ScanSettings::default()
    }
}

fn dated(closes: &[f64], end: NaiveDate) -> Vec<PriceBar> {
    let start = end - chrono::Duration::days(closes.len() as i64 - 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Uptrend, pullback onto EMA-short, then a 2% green bar on `end`.
///
/// Under `small_params`: price 140.25, stop 135.0, ATR 3.708333.
pub fn breakout_series(symbol: &str, end: NaiveDate) -> PriceSeries {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    closes.push(137.5);
    let mut bars = dated(&closes, end - chrono::Duration::days(1));
    let prev_close = 137.5;
    bars.push(PriceBar {
        date: end,
        open: prev_close,
        high: prev_close * 1.03,
        low: prev_close - 0.5,
        close: prev_close * 1.02,
        volume: 5000,
    });
    PriceSeries::new(symbol, bars).unwrap()
}

/// Sideways tape that never signals.
pub fn flat_series(symbol: &str, end: NaiveDate) -> PriceSeries {
    PriceSeries::new(symbol, dated(&[250.0; 45], end)).unwrap()
}

/// A single bar closing at `close` on `day`.
pub fn quote(symbol: &str, day: NaiveDate, close: f64) -> PriceSeries {
    PriceSeries::new(
        symbol,
        vec![PriceBar {
            date: day,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        }],
    )
    .unwrap()
}

pub fn trade(symbol: &str, emitted: NaiveDate) -> Signal {
    Signal {
        instrument: symbol.into(),
        price: 600.0,
        strategy_label: "EMA50 Daily".into(),
        stop_loss: 590.0,
        target1: 605.0,
        target2: 610.0,
        target3: 615.0,
        emitted_at: emitted.and_hms_opt(15, 45, 0).unwrap(),
    }
}

pub struct FailingUniverse;

impl UniverseProvider for FailingUniverse {
    fn name(&self) -> &str {
        "failing"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        Err(DataError::NetworkUnreachable("constituent list offline".into()))
    }
}

/// Table files in a temp dir that lives as long as this value.
pub struct Tables {
    _dir: TempDir,
    pub signal_log: SignalTable,
    pub open_trades: SignalTable,
}

impl Tables {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = |name: &str| -> PathBuf { dir.path().join(name) };
        let signal_log = SignalTable::new(path("buy_signals.csv"));
        let open_trades = SignalTable::new(path("open_trades.csv"));
        Self {
            _dir: dir,
            signal_log,
            open_trades,
        }
    }
}

pub fn driver(
    universe: Arc<dyn UniverseProvider>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    tables: &Tables,
) -> CycleDriver {
    CycleDriver::new(
        universe,
        source,
        notifier,
        small_params(),
        settings(4),
        tables.signal_log.clone(),
        tables.open_trades.clone(),
    )
}

pub fn universe<I: IntoIterator<Item = String>>(symbols: I) -> Arc<dyn UniverseProvider> {
    Arc::new(StaticUniverse::new(symbols))
}
