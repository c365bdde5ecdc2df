//! Parallel instrument scan.
//!
//! One task per instrument on a private rayon pool. Each task fetches every
//! configured timeframe, evaluates each series, announces any signal it
//! emits, then sleeps `batch_delay` so the provider sees a bounded request
//! rate. Results are aggregated on the calling thread after the join.

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

use emascan_core::config::ScanSettings;
use emascan_core::data::{DataError, DateRange, PriceSource};
use emascan_core::domain::{Signal, Timeframe};
use emascan_core::notify::{announce, Notifier};
use emascan_core::signal::{BreakoutEvaluator, Evaluation};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// What one instrument task produced.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    /// At least one timeframe was fetched and evaluated.
    Scanned { signals: Vec<Signal> },
    /// Every timeframe fetch failed.
    Failed { errors: Vec<(Timeframe, DataError)> },
    /// Cancellation was requested before the task started.
    Cancelled,
}

/// Aggregate of one scan pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub instruments_total: usize,
    pub instruments_failed: usize,
    pub instruments_cancelled: usize,
    /// Sorted by instrument, then strategy label.
    pub signals: Vec<Signal>,
}

impl ScanReport {
    pub fn was_cancelled(&self) -> bool {
        self.instruments_cancelled > 0
    }
}

/// Runs the breakout evaluator across a universe.
pub struct Scanner<'a> {
    source: &'a dyn PriceSource,
    notifier: &'a dyn Notifier,
    evaluator: BreakoutEvaluator,
    settings: ScanSettings,
}

impl<'a> Scanner<'a> {
    pub fn new(
        source: &'a dyn PriceSource,
        notifier: &'a dyn Notifier,
        evaluator: BreakoutEvaluator,
        settings: ScanSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            evaluator,
            settings,
        }
    }

    /// Scan `instruments` with history up to `today`, stamping signals with `now`.
    pub fn scan(
        &self,
        instruments: &[String],
        today: NaiveDate,
        now: NaiveDateTime,
        cancel: Option<&AtomicBool>,
    ) -> Result<ScanReport, ScanError> {
        let total = instruments.len();
        if total == 0 {
            return Ok(ScanReport::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.max_workers.max(1))
            .thread_name(|i| format!("emascan-worker-{i}"))
            .build()
            .map_err(|e| ScanError::Pool(e.to_string()))?;

        let range = DateRange::new(self.settings.history_start, today);
        let completed = AtomicUsize::new(0);

        let outcomes: Vec<(&String, InstrumentOutcome)> = pool.install(|| {
            instruments
                .par_iter()
                .map(|symbol| {
                    if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                        return (symbol, InstrumentOutcome::Cancelled);
                    }
                    let outcome = self.scan_instrument(symbol, range, now);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    let found = match &outcome {
                        InstrumentOutcome::Scanned { signals } => signals.len(),
                        _ => 0,
                    };
                    tracing::info!("[{done}/{total}] scanned {symbol} - signals: {found}");
                    if !self.settings.batch_delay().is_zero() {
                        std::thread::sleep(self.settings.batch_delay());
                    }
                    (symbol, outcome)
                })
                .collect()
        });

        let mut report = ScanReport {
            instruments_total: total,
            ..ScanReport::default()
        };
        for (symbol, outcome) in outcomes {
            match outcome {
                InstrumentOutcome::Scanned { signals } => report.signals.extend(signals),
                InstrumentOutcome::Failed { errors } => {
                    report.instruments_failed += 1;
                    let reason = errors
                        .first()
                        .map(|(_, e)| e.to_string())
                        .unwrap_or_default();
                    tracing::warn!(symbol = %symbol, %reason, "skipped instrument, no data");
                }
                InstrumentOutcome::Cancelled => report.instruments_cancelled += 1,
            }
        }
        report.signals.sort_by(|a, b| {
            a.instrument
                .cmp(&b.instrument)
                .then_with(|| a.strategy_label.cmp(&b.strategy_label))
        });

        if report.was_cancelled() {
            tracing::warn!(
                cancelled = report.instruments_cancelled,
                "scan cancelled before all instruments ran"
            );
        }
        Ok(report)
    }

    /// Fetch, evaluate and announce for one instrument.
    pub fn scan_instrument(
        &self,
        symbol: &str,
        range: DateRange,
        now: NaiveDateTime,
    ) -> InstrumentOutcome {
        let fetched = self
            .source
            .fetch_timeframes(symbol, &self.settings.timeframes, range);

        let mut signals = Vec::new();
        let mut errors = Vec::new();
        for (timeframe, result) in fetched {
            let series = match result {
                Ok(series) => series,
                Err(e) => {
                    tracing::debug!(symbol, %timeframe, error = %e, "fetch failed");
                    errors.push((timeframe, e));
                    continue;
                }
            };
            let label = timeframe.strategy_label(self.evaluator.params().ema_short);
            match self.evaluator.evaluate(&series, &label, now) {
                Evaluation::Signal(signal) => {
                    tracing::info!(symbol, strategy = %label, price = signal.price, "signal");
                    announce(self.notifier, &signal.announcement());
                    signals.push(signal);
                }
                Evaluation::NoSignal(report) => {
                    tracing::debug!(
                        symbol,
                        %timeframe,
                        trend = report.trend,
                        proximity = report.proximity,
                        momentum = report.momentum,
                        "no signal"
                    );
                }
                Evaluation::InsufficientHistory { bars, required } => {
                    tracing::debug!(symbol, %timeframe, bars, required, "insufficient history");
                }
            }
        }

        if !errors.is_empty() && errors.len() == self.settings.timeframes.len() {
            InstrumentOutcome::Failed { errors }
        } else {
            InstrumentOutcome::Scanned { signals }
        }
    }
}
