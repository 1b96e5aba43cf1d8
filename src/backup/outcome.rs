// mysql-backup/src/backup/outcome.rs
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::retention::CleanupReport;

/// Result of dumping one database within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseBackupOutcome {
    pub database: String,
    pub success: bool,
    /// Only set on success.
    pub file: Option<PathBuf>,
    pub size: u64,
    pub elapsed: Duration,
    /// Only set on failure.
    pub error: Option<String>,
}

impl DatabaseBackupOutcome {
    pub fn succeeded(database: &str, file: PathBuf, size: u64, elapsed: Duration) -> Self {
        DatabaseBackupOutcome {
            database: database.to_string(),
            success: true,
            file: Some(file),
            size,
            elapsed,
            error: None,
        }
    }

    pub fn failed(database: &str, elapsed: Duration, error: impl Into<String>) -> Self {
        DatabaseBackupOutcome {
            database: database.to_string(),
            success: false,
            file: None,
            size: 0,
            elapsed,
            error: Some(error.into()),
        }
    }
}

/// One invocation of the orchestrator: every configured database, then one cleanup pass.
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub started: NaiveDateTime,
    pub finished: NaiveDateTime,
    pub elapsed: Duration,
    pub databases: Vec<String>,
    pub destination: PathBuf,
    pub outcomes: Vec<DatabaseBackupOutcome>,
    pub cleanup: CleanupReport,
}

impl BackupRun {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.database.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.database.as_str())
            .collect()
    }

    pub fn duration(&self) -> Duration {
        self.elapsed
    }
}
