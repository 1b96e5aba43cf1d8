// mysql-backup/src/config/mod.rs
use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backup::db_dump::DumpOptions;
use crate::backup::mysql::ConnectionParams;

pub const PASSWORD_ENV: &str = "MYSQL_BACKUP_PASSWORD";

const DEFAULT_PORT: u16 = 3306;
const DEFAULT_RETENTION_DAYS: u32 = 10;
const DEFAULT_BACKUP_TIME: &str = "02:30";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 600;

// Struct for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database_names: Option<serde_json::Value>,
    pub backup_dir: Option<PathBuf>,
    pub retention_days: Option<u32>,
    pub backup_times: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
    pub query_timeout_secs: Option<u64>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub databases: Vec<String>,
    pub backup_root: PathBuf,
    pub retention_days: u32,
    pub backup_times: Vec<NaiveTime>,
    pub dump_options: DumpOptions,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ConnectionParams,
    pub backup: BackupConfig,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        AppConfig::from_raw(raw_json_config, env::var(PASSWORD_ENV).ok())
    }

    /// Validates the raw file contents. A non-empty `password_override` (from the
    /// environment) wins over the password in the file.
    pub fn from_raw(raw: RawJsonConfig, password_override: Option<String>) -> Result<Self> {
        let host = required(raw.host, "host")?;
        let username = required(raw.username, "username")?;
        let password = password_override
            .filter(|p| !p.is_empty())
            .or(raw.password)
            .unwrap_or_default();

        let backup_dir = raw
            .backup_dir
            .context("backup_dir must be set in config.json")?;
        if backup_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("backup_dir cannot be empty in config.json."));
        }

        let server = ConnectionParams {
            host,
            port: raw.port.unwrap_or(DEFAULT_PORT),
            username,
            password,
        };

        let backup = BackupConfig {
            databases: parse_database_names(&raw.database_names)?,
            backup_root: expand_home(&backup_dir),
            retention_days: raw.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            backup_times: parse_backup_times(raw.backup_times.as_deref())?,
            dump_options: DumpOptions {
                connect_timeout: Duration::from_secs(
                    raw.connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
                ),
                query_timeout: Duration::from_secs(
                    raw.query_timeout_secs.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
                ),
            },
        };

        Ok(AppConfig { server, backup })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => Err(anyhow::anyhow!("{} cannot be empty in config.json.", field)),
        None => Err(anyhow::anyhow!("{} must be set in config.json", field)),
    }
}

/// Parses `database_names`, which may be a single name or an array of names.
fn parse_database_names(database_names: &Option<serde_json::Value>) -> Result<Vec<String>> {
    let names: Vec<String> = match database_names {
        Some(value) if value.is_string() => vec![
            serde_json::from_value(value.clone()).context("Failed to parse database_names as string")?,
        ],
        Some(value) if value.is_array() => serde_json::from_value(value.clone())
            .context("Failed to parse database_names as array of strings")?,
        Some(_) => {
            return Err(anyhow::anyhow!(
                "database_names must be either a database name or an array of database names"
            ));
        }
        None => return Err(anyhow::anyhow!("database_names must be set in config.json")),
    };

    if let Some(bad) = names.iter().find(|n| n.trim().is_empty()) {
        return Err(anyhow::anyhow!("Invalid empty database name in database_names: {:?}", bad));
    }
    Ok(names.into_iter().map(|n| n.trim().to_string()).collect())
}

/// Parses daily trigger times given as `HH:MM` (or `HH:MM:SS`).
fn parse_backup_times(times: Option<&[String]>) -> Result<Vec<NaiveTime>> {
    let default = [DEFAULT_BACKUP_TIME.to_string()];
    let times = times.unwrap_or(&default);
    times
        .iter()
        .map(|t| {
            NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S"))
                .with_context(|| format!("Invalid backup time '{}' in backup_times, expected HH:MM", t))
        })
        .collect()
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
