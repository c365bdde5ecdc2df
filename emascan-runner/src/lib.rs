//! EMA scanner runner: scan orchestration, trade monitoring, the daily
//! schedule, and logging setup.
//!
//! This crate builds on `emascan-core` to provide:
//! - `Scanner`, a bounded rayon pool running one task per instrument
//! - `TradeMonitor`, the remove-on-resolve pass over open trades
//! - `CycleDriver`, universe → scan → persist → monitor
//! - `DailySchedule` and the scheduled-mode loop

pub mod cycle;
pub mod logging;
pub mod monitor;
pub mod scan;
pub mod schedule;

pub use cycle::{
    manual_completion_message, scheduled_message, CycleDriver, CycleError, CycleReport,
};
pub use logging::init_tracing;
pub use monitor::{MonitorReport, TradeMonitor};
pub use scan::{InstrumentOutcome, ScanError, ScanReport, Scanner};
pub use schedule::{run_scheduled, run_scheduled_with_clock, DailySchedule};

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<CycleDriver>();
        require_sync::<CycleDriver>();
        require_send::<CycleReport>();
        require_send::<ScanReport>();
        require_send::<DailySchedule>();
        require_sync::<DailySchedule>();
    }
}
