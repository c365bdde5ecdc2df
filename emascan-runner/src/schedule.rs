//! Daily trigger for scheduled mode.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use emascan_core::config::{ConfigError, ScheduleConfig};

use crate::cycle::CycleDriver;

/// A wall-clock time of day in a fixed zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    time: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(time: NaiveTime, tz: Tz) -> Self {
        Self { time, tz }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.trigger_time()?, config.tz()?))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// First trigger strictly after `now`.
    ///
    /// A trigger time that falls in a DST gap is skipped for that day.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        let mut day = now.with_timezone(&self.tz).date_naive();
        loop {
            if let Some(at) = self
                .tz
                .from_local_datetime(&day.and_time(self.time))
                .earliest()
            {
                if at.with_timezone(&Utc) > now {
                    return at;
                }
            }
            day += ChronoDuration::days(1);
        }
    }
}

/// Run a cycle every day at the scheduled time until `cancel` is set.
///
/// Wakes every `poll` and runs once the next trigger has passed. A failed
/// cycle is logged and the loop carries on. Returns the number of cycles run.
pub fn run_scheduled(
    driver: &CycleDriver,
    schedule: &DailySchedule,
    poll: Duration,
    cancel: &AtomicBool,
) -> usize {
    run_scheduled_with_clock(driver, schedule, poll, cancel, &mut Utc::now)
}

/// `run_scheduled` with an injectable clock.
pub fn run_scheduled_with_clock(
    driver: &CycleDriver,
    schedule: &DailySchedule,
    poll: Duration,
    cancel: &AtomicBool,
    clock: &mut dyn FnMut() -> DateTime<Utc>,
) -> usize {
    let mut next = schedule.next_after(clock());
    tracing::info!(next = %next, "scheduler started");
    let mut cycles = 0;

    while !cancel.load(Ordering::Relaxed) {
        if !poll.is_zero() {
            std::thread::sleep(poll);
        }
        let now = clock();
        if now < next {
            continue;
        }

        let local = now.with_timezone(&schedule.tz()).naive_local();
        match driver.run_cycle(local, Some(cancel)) {
            Ok(report) => tracing::info!(signals = report.signals.len(), "scheduled cycle done"),
            Err(e) => tracing::error!(error = %e, "scheduled cycle failed"),
        }
        cycles += 1;
        next = schedule.next_after(now);
        tracing::info!(next = %next, "next cycle scheduled");
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ist_1545() -> DailySchedule {
        DailySchedule::new(
            NaiveTime::from_hms_opt(15, 45, 0).unwrap(),
            chrono_tz::Asia::Kolkata,
        )
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 6, d)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
        )
    }

    #[test]
    fn next_trigger_same_day() {
        // 09:00 IST
        let next = ist_1545().next_after(utc(3, 3, 30));
        assert_eq!(next.with_timezone(&Utc), utc(3, 10, 15));
    }

    #[test]
    fn trigger_passed_rolls_to_tomorrow() {
        // 16:00 IST
        let next = ist_1545().next_after(utc(3, 10, 30));
        assert_eq!(next.with_timezone(&Utc), utc(4, 10, 15));
        // exactly at the trigger is not "after"
        let next = ist_1545().next_after(utc(3, 10, 15));
        assert_eq!(next.with_timezone(&Utc), utc(4, 10, 15));
    }

    #[test]
    fn from_config_defaults() {
        let schedule = DailySchedule::from_config(&ScheduleConfig::default()).unwrap();
        assert_eq!(schedule, ist_1545());
    }

    #[test]
    fn dst_gap_skips_the_day() {
        // 02:30 does not exist in New York on 2024-03-10
        let schedule = DailySchedule::new(
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            chrono_tz::America::New_York,
        );
        let now = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        let next = schedule.next_after(now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }
}
