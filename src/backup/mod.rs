pub(crate) mod db_dump;
pub(crate) mod encoder;
pub(crate) mod logic;
pub(crate) mod mysql;
pub(crate) mod outcome;
pub(crate) mod table_dump;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::AppConfig;
use mysql::MySqlConnector;
use outcome::BackupRun;

/// Public entry point for a single backup run against the configured server.
pub async fn run_backup_flow(app_config: &AppConfig) -> BackupRun {
    let connector = MySqlConnector::new(app_config.server.clone());
    logic::BackupOrchestrator::new(&connector, &app_config.backup)
        .run_backup()
        .await
}
