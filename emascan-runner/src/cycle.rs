//! One scan cycle: universe → scan → persist → monitor.

use chrono::NaiveDateTime;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

use emascan_core::config::{ScanSettings, StrategyParams};
use emascan_core::data::{DataError, PriceSource, UniverseProvider};
use emascan_core::domain::{Resolution, Signal};
use emascan_core::notify::Notifier;
use emascan_core::signal::BreakoutEvaluator;
use emascan_core::store::{SignalTable, StoreError};

use crate::monitor::{MonitorReport, TradeMonitor};
use crate::scan::{ScanError, Scanner};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("universe unavailable: {0}")]
    Universe(#[source] DataError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("failed to persist tables: {0}")]
    Store(#[from] StoreError),
}

/// Summary of a completed cycle. Logged, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: NaiveDateTime,
    pub instruments_total: usize,
    pub instruments_failed: usize,
    pub signals: Vec<Signal>,
    pub resolutions: Vec<Resolution>,
    pub retained: usize,
}

/// Announcement sent after a manually triggered cycle.
pub fn manual_completion_message(ema_short: usize) -> String {
    format!("✅ Manual NSE EMA{ema_short} scan completed")
}

/// Announcement sent once scheduled mode has started.
pub fn scheduled_message(ema_short: usize) -> String {
    format!("✅ NSE EMA{ema_short} Scanner scheduled successfully")
}

/// Owns the collaborators for scan cycles and monitoring passes.
pub struct CycleDriver {
    universe: Arc<dyn UniverseProvider>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    params: StrategyParams,
    settings: ScanSettings,
    signal_log: SignalTable,
    open_trades: SignalTable,
}

impl CycleDriver {
    pub fn new(
        universe: Arc<dyn UniverseProvider>,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        params: StrategyParams,
        settings: ScanSettings,
        signal_log: SignalTable,
        open_trades: SignalTable,
    ) -> Self {
        Self {
            universe,
            source,
            notifier,
            params,
            settings,
            signal_log,
            open_trades,
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn instruments(&self) -> Result<Vec<String>, CycleError> {
        self.universe.instruments().map_err(CycleError::Universe)
    }

    /// Run a full cycle stamped with `now` (exchange-local time).
    ///
    /// Signals are appended to both tables before the monitor runs, so the
    /// monitor sees this cycle's trades and leaves them open.
    pub fn run_cycle(
        &self,
        now: NaiveDateTime,
        cancel: Option<&AtomicBool>,
    ) -> Result<CycleReport, CycleError> {
        let today = now.date();
        tracing::info!(%now, "scan cycle started");

        let instruments = self.instruments()?;
        tracing::info!(
            total = instruments.len(),
            universe = self.universe.name(),
            source = self.source.name(),
            "scanning universe"
        );

        let scanner = Scanner::new(
            self.source.as_ref(),
            self.notifier.as_ref(),
            BreakoutEvaluator::new(self.params.clone()),
            self.settings.clone(),
        );
        let scan = scanner.scan(&instruments, today, now, cancel)?;

        if scan.signals.is_empty() {
            tracing::info!("no signals found today");
        } else {
            self.signal_log.append(&scan.signals)?;
            self.open_trades.append(&scan.signals)?;
            tracing::info!(total = scan.signals.len(), "signals written");
        }

        let monitor = self.run_monitor(now)?;

        let report = CycleReport {
            started_at: now,
            instruments_total: scan.instruments_total,
            instruments_failed: scan.instruments_failed,
            signals: scan.signals,
            resolutions: monitor.resolutions,
            retained: monitor.retained,
        };
        tracing::info!(
            instruments = report.instruments_total,
            failed = report.instruments_failed,
            signals = report.signals.len(),
            resolved = report.resolutions.len(),
            retained = report.retained,
            "scan cycle completed"
        );
        Ok(report)
    }

    /// Monitor the open-trades table without scanning.
    pub fn run_monitor(&self, now: NaiveDateTime) -> Result<MonitorReport, CycleError> {
        let monitor = TradeMonitor::new(
            self.source.as_ref(),
            self.notifier.as_ref(),
            &self.open_trades,
        );
        Ok(monitor.run(now.date())?)
    }
}
