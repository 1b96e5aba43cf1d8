// mysql-backup/src/retention/logic.rs
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{Days, NaiveDate};
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use super::CleanupReport;

lazy_static! {
    static ref DATE_DIR: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_DIR: Regex = Regex::new(r"^\d{4}$").unwrap();
    static ref ARTIFACT: Regex = Regex::new(r"^.+_backup_.+\.sql$").unwrap();
}

/// Cleanup relative to an explicit `today`.
///
/// A directory's age comes from its `YYYY-MM-DD` name only. Directories dated strictly
/// before `today - retention_days` are removed whole; everything else under the root
/// is left alone.
pub fn cleanup_as_of(backup_root: &Path, retention_days: u32, today: NaiveDate) -> CleanupReport {
    let mut report = CleanupReport::default();

    let cutoff = match today.checked_sub_days(Days::new(u64::from(retention_days))) {
        Some(cutoff) => cutoff,
        None => {
            warn!("Retention of {} days reaches before the earliest date, nothing to clean", retention_days);
            return report;
        }
    };

    let entries = match fs::read_dir(backup_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Backup directory {} does not exist, nothing to clean", backup_root.display());
            return report;
        }
        Err(e) => {
            error!("Failed to read backup directory {}: {}", backup_root.display(), e);
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read an entry of {}: {}", backup_root.display(), e);
                continue;
            }
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || !DATE_DIR.is_match(name) {
            continue;
        }
        report.checked += 1;

        let date = match NaiveDate::parse_from_str(name, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                debug!("Skipping {}: not a valid date", name);
                continue;
            }
        };
        if date >= cutoff {
            continue;
        }

        let path = entry.path();
        let files = count_artifacts(&path);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!("Deleted expired backup directory: {} ({} backup files)", name, files);
                report.deleted_dirs += 1;
                report.deleted_files += files;
            }
            Err(e) => {
                error!("Failed to delete directory {}: {}", name, e);
                report.failed += 1;
            }
        }
    }

    if report.deleted_dirs > 0 {
        info!(
            "Cleaned up {} expired backup directories, {} backup files (checked {} directories)",
            report.deleted_dirs, report.deleted_files, report.checked
        );
    } else {
        info!("No expired backup directories found (checked {} directories)", report.checked);
    }

    report
}

/// Counts `*_backup_*.sql` files inside the `HHMM` subdirectories of a date directory.
fn count_artifacts(date_dir: &Path) -> usize {
    WalkDir::new(date_dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let in_time_dir = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
                .is_some_and(|n| TIME_DIR.is_match(n));
            let is_artifact = entry
                .file_name()
                .to_str()
                .is_some_and(|n| ARTIFACT.is_match(n));
            in_time_dir && is_artifact
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn make_run(root: &Path, day: &str, time: &str, databases: &[&str]) -> anyhow::Result<PathBuf> {
        let dir = root.join(day).join(time);
        fs::create_dir_all(&dir)?;
        let stamp = format!("{}_{}00", day.replace('-', ""), time);
        for db in databases {
            fs::write(dir.join(format!("{}_backup_{}.sql", db, stamp)), "SET FOREIGN_KEY_CHECKS=1;\n")?;
        }
        Ok(dir)
    }

    #[test]
    fn test_retention_boundary() -> anyhow::Result<()> {
        let root = tempdir()?;
        make_run(root.path(), "2024-03-05", "0230", &["shop"])?;
        make_run(root.path(), "2024-03-04", "0230", &["shop", "crm"])?;
        fs::create_dir(root.path().join("not-a-date"))?;

        let report = cleanup_as_of(root.path(), 10, date("2024-03-15"));

        assert!(root.path().join("2024-03-05").exists());
        assert!(!root.path().join("2024-03-04").exists());
        assert!(root.path().join("not-a-date").exists());
        assert_eq!(
            report,
            CleanupReport { checked: 2, deleted_dirs: 1, deleted_files: 2, failed: 0 }
        );
        Ok(())
    }

    #[test]
    fn test_cleanup_is_idempotent() -> anyhow::Result<()> {
        let root = tempdir()?;
        make_run(root.path(), "2024-01-01", "0230", &["shop"])?;
        make_run(root.path(), "2024-01-02", "1430", &["shop"])?;
        make_run(root.path(), "2024-03-14", "0230", &["shop"])?;
        let today = date("2024-03-15");

        let first = cleanup_as_of(root.path(), 10, today);
        assert_eq!(first.deleted_dirs, 2);
        assert_eq!(first.deleted_files, 2);

        let second = cleanup_as_of(root.path(), 10, today);
        assert_eq!(second.deleted_dirs, 0);
        assert_eq!(second.deleted_files, 0);
        assert!(root.path().join("2024-03-14").exists());
        Ok(())
    }

    #[test]
    fn test_only_artifacts_in_time_dirs_are_counted() -> anyhow::Result<()> {
        let root = tempdir()?;
        let time_dir = make_run(root.path(), "2024-01-01", "0230", &["shop", "crm"])?;
        make_run(root.path(), "2024-01-01", "1430", &["shop"])?;
        fs::write(time_dir.join("notes.txt"), "x")?;
        fs::write(root.path().join("2024-01-01").join("stray_backup_1.sql"), "x")?;
        let odd = root.path().join("2024-01-01").join("misc");
        fs::create_dir_all(&odd)?;
        fs::write(odd.join("shop_backup_20240101_023000.sql"), "x")?;

        let report = cleanup_as_of(root.path(), 10, date("2024-03-15"));

        assert_eq!(report.deleted_dirs, 1);
        assert_eq!(report.deleted_files, 3);
        assert!(!root.path().join("2024-01-01").exists());
        Ok(())
    }

    #[test]
    fn test_invalid_dates_and_files_are_skipped() -> anyhow::Result<()> {
        let root = tempdir()?;
        fs::create_dir(root.path().join("2024-13-45"))?;
        fs::create_dir(root.path().join("logs"))?;
        fs::write(root.path().join("2020-01-01"), "a file, not a directory")?;

        let report = cleanup_as_of(root.path(), 0, date("2024-03-15"));

        assert_eq!(report, CleanupReport { checked: 1, ..CleanupReport::default() });
        assert!(root.path().join("2024-13-45").exists());
        assert!(root.path().join("logs").exists());
        assert!(root.path().join("2020-01-01").is_file());
        Ok(())
    }

    #[test]
    fn test_zero_retention_keeps_today() -> anyhow::Result<()> {
        let root = tempdir()?;
        make_run(root.path(), "2024-03-15", "0230", &["shop"])?;
        make_run(root.path(), "2024-03-14", "2330", &["shop"])?;

        let report = cleanup_as_of(root.path(), 0, date("2024-03-15"));

        assert_eq!(report.deleted_dirs, 1);
        assert!(root.path().join("2024-03-15").exists());
        assert!(!root.path().join("2024-03-14").exists());
        Ok(())
    }

    #[test]
    fn test_missing_root_reports_nothing() {
        let report = cleanup_as_of(Path::new("/nonexistent/mysql-backup-root"), 10, date("2024-03-15"));
        assert_eq!(report, CleanupReport::default());
    }
}
