// mysql-backup/src/schedule/mod.rs
use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use log::{info, warn};

use crate::backup::db_dump::Connector;
use crate::backup::logic::BackupOrchestrator;
use crate::config::BackupConfig;
use crate::utils::logging::DailyLog;

/// The daily trigger times. Owned by the caller; nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    times: Vec<NaiveTime>,
}

impl Schedule {
    pub fn new(mut times: Vec<NaiveTime>) -> Self {
        times.sort();
        times.dedup();
        Schedule { times }
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// First trigger instant strictly after `now`: a later time today, or else the
    /// earliest time tomorrow. `None` when there are no trigger times.
    pub fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let today = now.date();
        if let Some(time) = self.times.iter().find(|t| today.and_time(**t) > now) {
            return Some(today.and_time(*time));
        }
        let first = self.times.first()?;
        today
            .checked_add_days(Days::new(1))
            .map(|tomorrow| tomorrow.and_time(*first))
    }
}

/// Waits for each trigger time and runs one backup per occurrence until Ctrl+C.
///
/// The interrupt is only honoured while waiting; a run that has started always
/// completes, cleanup included.
pub async fn run_schedule_loop(
    connector: &dyn Connector,
    config: &BackupConfig,
    daily_log: &mut DailyLog,
) -> Result<()> {
    let schedule = Schedule::new(config.backup_times.clone());
    let orchestrator = BackupOrchestrator::new(connector, config);

    for time in schedule.times() {
        info!("Scheduled daily backup at {}", time.format("%H:%M"));
    }
    info!("Waiting for the next backup time, press Ctrl+C to exit");

    loop {
        let now = Local::now().naive_local();
        let next = schedule
            .next_after(now)
            .context("No backup times configured")?;
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next backup at {}", next.format("%Y-%m-%d %H:%M:%S"));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Interrupted, scheduler stopped");
                return Ok(());
            }
        }

        if let Err(e) = daily_log.roll_over() {
            warn!("Failed to switch to today's log file: {:#}", e);
        }
        let run = orchestrator.run_backup().await;
        if !run.all_succeeded() {
            warn!(
                "Backup run finished with {} failed databases: {}; they will be retried at the next scheduled time",
                run.failed().len(),
                run.failed().join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_times_are_sorted_and_deduplicated() {
        let schedule = Schedule::new(vec![time(14, 30), time(2, 30), time(14, 30)]);
        assert_eq!(schedule.times(), &[time(2, 30), time(14, 30)]);
    }

    #[test]
    fn test_next_later_today() {
        let schedule = Schedule::new(vec![time(2, 30), time(14, 30)]);
        assert_eq!(schedule.next_after(at(15, 1, 0)), Some(at(15, 2, 30)));
        assert_eq!(schedule.next_after(at(15, 3, 0)), Some(at(15, 14, 30)));
    }

    #[test]
    fn test_next_rolls_over_to_tomorrow() {
        let schedule = Schedule::new(vec![time(2, 30), time(14, 30)]);
        assert_eq!(schedule.next_after(at(15, 20, 0)), Some(at(16, 2, 30)));
    }

    #[test]
    fn test_exact_trigger_time_moves_to_next() {
        let schedule = Schedule::new(vec![time(2, 30)]);
        assert_eq!(schedule.next_after(at(15, 2, 30)), Some(at(16, 2, 30)));
    }

    #[test]
    fn test_empty_schedule() {
        assert_eq!(Schedule::new(Vec::new()).next_after(at(15, 0, 0)), None);
    }
}
