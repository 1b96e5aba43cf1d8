// Server connectivity check run before scheduling backups
use anyhow::{Context, Result};
use log::{info, warn};

use crate::backup::mysql::MySqlConnector;
use crate::backup::db_dump::{Connector, bounded};

/// Connects to the server without a default schema, runs a probe query and reports
/// configured databases the server does not have.
///
/// Returns the names of the missing databases; an unreachable server is an error.
pub async fn check_db_connection(
    connector: &MySqlConnector,
    databases: &[String],
    connect_timeout: std::time::Duration,
) -> Result<Vec<String>> {
    info!("Testing connection to {}", connector.source());

    let available = bounded(connect_timeout, "Connection check", connector.probe())
        .await
        .with_context(|| format!("Failed to connect to MySQL server at {}", connector.source()))?;
    info!("✅ Successfully connected to {}", connector.source());

    let missing = missing_databases(databases, &available);
    if !missing.is_empty() {
        warn!("The following databases do not exist: {}", missing.join(", "));
    }
    Ok(missing)
}

fn missing_databases(configured: &[String], available: &[String]) -> Vec<String> {
    configured
        .iter()
        .filter(|db| !available.contains(db))
        .cloned()
        .collect()
}
