// mysql-backup/src/backup/logic.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use log::{error, info, warn};

use crate::backup::db_dump::{Connector, DumpEngine};
use crate::backup::outcome::{BackupRun, DatabaseBackupOutcome};
use crate::config::BackupConfig;
use crate::errors::DumpError;
use crate::retention;
use crate::utils::format_megabytes;

const BANNER: &str = "============================================================";

/// `{database}_backup_{YYYYMMDD_HHMMSS}.sql`
pub fn artifact_file_name(database: &str, started: &NaiveDateTime) -> String {
    format!("{}_backup_{}.sql", database, started.format("%Y%m%d_%H%M%S"))
}

/// `{root}/{YYYY-MM-DD}/{HHMM}`
pub fn run_directory(backup_root: &Path, started: &NaiveDateTime) -> PathBuf {
    backup_root
        .join(started.format("%Y-%m-%d").to_string())
        .join(started.format("%H%M").to_string())
}

/// Backs up every configured database in order, then runs retention cleanup.
pub struct BackupOrchestrator<'a> {
    connector: &'a dyn Connector,
    config: &'a BackupConfig,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(connector: &'a dyn Connector, config: &'a BackupConfig) -> Self {
        BackupOrchestrator { connector, config }
    }

    pub async fn run_backup(&self) -> BackupRun {
        self.run_backup_at(Local::now().naive_local()).await
    }

    /// One run stamped with `started`. Every configured database yields exactly one
    /// outcome; a failing database never stops the others.
    pub async fn run_backup_at(&self, started: NaiveDateTime) -> BackupRun {
        let clock = Instant::now();
        let databases = &self.config.databases;
        let destination = run_directory(&self.config.backup_root, &started);

        info!("{}", BANNER);
        info!("Starting backup of {} databases", databases.len());
        info!("Backup time: {}", started.format("%Y-%m-%d %H:%M:%S"));
        info!("Target host: {}", self.connector.source());
        info!("Databases: {}", databases.join(", "));
        info!("Backup directory: {}", destination.display());
        info!("{}", BANNER);

        let prepared = fs::create_dir_all(&destination).map_err(|e| {
            let message = format!(
                "Failed to create backup directory {}: {}",
                destination.display(),
                e
            );
            error!("{}", message);
            message
        });

        let mut outcomes = Vec::with_capacity(databases.len());
        for (index, database) in databases.iter().enumerate() {
            info!("[{}/{}] Backing up database: {}", index + 1, databases.len(), database);
            let outcome = match &prepared {
                Ok(()) => self.backup_database(database, &destination, &started).await,
                Err(message) => DatabaseBackupOutcome::failed(database, Default::default(), message.as_str()),
            };
            outcomes.push(outcome);
        }

        let cleanup = retention::cleanup(&self.config.backup_root, self.config.retention_days);

        let run = BackupRun {
            started,
            finished: Local::now().naive_local(),
            elapsed: clock.elapsed(),
            databases: databases.clone(),
            destination,
            outcomes,
            cleanup,
        };
        log_summary(&run);
        run
    }

    async fn backup_database(
        &self,
        database: &str,
        destination: &Path,
        started: &NaiveDateTime,
    ) -> DatabaseBackupOutcome {
        let path = destination.join(artifact_file_name(database, started));
        let clock = Instant::now();

        let result = DumpEngine::new(self.connector, self.config.dump_options)
            .run(database, &path)
            .await;
        let elapsed = clock.elapsed();

        let error = match result {
            Ok(summary) => match fs::metadata(&path) {
                Ok(meta) => {
                    info!("✅ {} backed up successfully", database);
                    info!("   File: {}", path.display());
                    info!("   Size: {}", format_megabytes(meta.len()));
                    info!("   Tables: {}, rows: {}", summary.tables, summary.rows);
                    info!("   Elapsed: {:.2?}", elapsed);
                    return DatabaseBackupOutcome::succeeded(database, path, meta.len(), elapsed);
                }
                Err(e) => {
                    remove_partial(&path);
                    format!("Backup file {} unreadable after dump: {}", path.display(), e)
                }
            },
            // Someone else's file; leave it alone.
            Err(e @ DumpError::ArtifactExists(_)) => e.to_string(),
            Err(e) => {
                remove_partial(&path);
                e.to_string()
            }
        };

        error!("❌ {} backup failed: {}", database, error);
        DatabaseBackupOutcome::failed(database, elapsed, error)
    }
}

fn remove_partial(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => info!("Removed incomplete backup file {}", path.display()),
        Err(e) => error!("Failed to remove incomplete backup file {}: {}", path.display(), e),
    }
}

fn log_summary(run: &BackupRun) {
    let succeeded = run.succeeded();
    let failed = run.failed();

    info!("{}", BANNER);
    info!("Backup run finished");
    info!(
        "Started: {}, finished: {}",
        run.started.format("%Y-%m-%d %H:%M:%S"),
        run.finished.format("%Y-%m-%d %H:%M:%S")
    );
    info!("Total elapsed: {:.2?}", run.duration());
    info!("Succeeded: {}/{} databases", succeeded.len(), run.databases.len());
    info!("Failed: {} databases", failed.len());
    if !succeeded.is_empty() {
        info!("Succeeded: {}", succeeded.join(", "));
    }
    if !failed.is_empty() {
        error!("Failed: {}", failed.join(", "));
    }
    if run.cleanup.failed > 0 {
        warn!("{} expired backup directories could not be deleted", run.cleanup.failed);
    }
    info!("{}", BANNER);
}
