//! Open-trade monitoring.
//!
//! Each pass reads the open-trades table, prices every trade against the
//! latest close of the day, announces and drops trades that touched a target
//! or the stop, and rewrites the table with the survivors.

use chrono::NaiveDate;
use std::collections::HashMap;

use emascan_core::data::{DataError, PriceSource};
use emascan_core::domain::{OpenTrade, Resolution};
use emascan_core::notify::{announce, Notifier};
use emascan_core::store::{SignalTable, StoreError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub checked: usize,
    pub resolutions: Vec<Resolution>,
    pub retained: usize,
    /// Trades kept because no price was available.
    pub unpriced: usize,
}

pub struct TradeMonitor<'a> {
    source: &'a dyn PriceSource,
    notifier: &'a dyn Notifier,
    table: &'a SignalTable,
}

impl<'a> TradeMonitor<'a> {
    pub fn new(
        source: &'a dyn PriceSource,
        notifier: &'a dyn Notifier,
        table: &'a SignalTable,
    ) -> Self {
        Self {
            source,
            notifier,
            table,
        }
    }

    /// Run one monitoring pass for `today`.
    ///
    /// A missing or empty table is a no-op and is not rewritten.
    pub fn run(&self, today: NaiveDate) -> Result<MonitorReport, StoreError> {
        let trades = self.table.load_trades()?;
        if trades.is_empty() {
            tracing::debug!(table = %self.table.path().display(), "no open trades");
            return Ok(MonitorReport::default());
        }

        let mut prices: HashMap<String, Option<f64>> = HashMap::new();
        let mut report = MonitorReport {
            checked: trades.len(),
            ..MonitorReport::default()
        };
        let mut retained: Vec<OpenTrade> = Vec::with_capacity(trades.len());

        for trade in trades {
            // never resolve a trade on the day it was opened
            if trade.signal().emitted_at.date() >= today {
                retained.push(trade);
                continue;
            }

            let latest = *prices
                .entry(trade.instrument().to_string())
                .or_insert_with(|| self.latest_price(trade.instrument(), today));
            let Some(price) = latest else {
                report.unpriced += 1;
                retained.push(trade);
                continue;
            };

            let state = trade.assess(price);
            if state.is_terminal() {
                let resolution = Resolution {
                    trade,
                    state,
                    price,
                };
                tracing::info!(
                    symbol = resolution.trade.instrument(),
                    state = %state,
                    price,
                    "trade resolved"
                );
                announce(self.notifier, &resolution.announcement());
                report.resolutions.push(resolution);
            } else {
                retained.push(trade);
            }
        }

        self.table.rewrite_trades(&retained)?;
        report.retained = retained.len();
        tracing::info!(
            checked = report.checked,
            resolved = report.resolutions.len(),
            retained = report.retained,
            "monitor pass complete"
        );
        Ok(report)
    }

    fn latest_price(&self, symbol: &str, today: NaiveDate) -> Option<f64> {
        match self.source.latest_close(symbol, today) {
            Ok(price) => price,
            Err(DataError::SymbolNotFound { .. }) => None,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "could not price open trade");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emascan_core::data::StaticPriceSource;
    use emascan_core::notify::RecordingNotifier;

    #[test]
    fn missing_table_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let table = SignalTable::new(dir.path().join("open_trades.csv"));
        let source = StaticPriceSource::new();
        let notifier = RecordingNotifier::new();
        let today = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();

        let report = TradeMonitor::new(&source, &notifier, &table)
            .run(today)
            .unwrap();
        assert_eq!(report, MonitorReport::default());
        assert!(!table.path().exists());
        assert_eq!(source.calls(), 0);
    }
}
