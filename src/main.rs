//! MySQL Backup Tool
//!
//! Dumps the configured MySQL databases into dated `.sql` files and removes backups
//! that fall outside the retention window.

// mysql-backup/src/main.rs
mod backup;
mod config;
mod errors;
mod retention;
mod schedule;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::AppConfig;
use log::{LevelFilter, error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use backup::mysql::MySqlConnector;

#[derive(Parser, Debug)]
#[command(name = "mysql-backup", version, about = "Scheduled logical backups of MySQL databases with retention cleanup")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Log debug messages as well
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Back up every configured database once, then clean up old backups
    Backup,
    /// Check the connection, then back up at every configured time until Ctrl+C (default)
    Schedule,
    /// Test the server connection and report missing databases
    Check,
    /// Delete expired backup directories only
    Cleanup,
}

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_app(cli).await {
        Ok(true) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("❌ Operation finished with failures, see the log for details.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: Cli) -> Result<bool> {
    // A missing .env file is fine; it only supplies MYSQL_BACKUP_PASSWORD.
    dotenv::dotenv().ok();

    let app_config = AppConfig::load_from_json(&cli.config).context(format!(
        "Failed to load application configuration from {}",
        cli.config.display()
    ))?;

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let log_dir = app_config.backup.backup_root.join("logs");
    let mut daily_log = utils::logging::init_logging(Some(&log_dir), level)?;

    let command = cli.command.unwrap_or(Command::Schedule);
    info!("mysql-backup {} starting: {:?}", env!("CARGO_PKG_VERSION"), command);
    info!("Target server: {}:{}", app_config.server.host, app_config.server.port);
    info!("Databases: {}", app_config.backup.databases.join(", "));
    info!("Backup root: {}", app_config.backup.backup_root.display());
    info!("Retention: {} days", app_config.backup.retention_days);

    match command {
        Command::Backup => {
            let run = backup::run_backup_flow(&app_config).await;
            Ok(run.all_succeeded())
        }
        Command::Schedule => {
            let connector = MySqlConnector::new(app_config.server.clone());
            check_connection(&connector, &app_config).await?;
            schedule::run_schedule_loop(&connector, &app_config.backup, &mut daily_log)
                .await
                .context("Scheduler failed")?;
            Ok(true)
        }
        Command::Check => {
            let connector = MySqlConnector::new(app_config.server.clone());
            check_connection(&connector, &app_config).await?;
            Ok(true)
        }
        Command::Cleanup => {
            let report = retention::cleanup(
                &app_config.backup.backup_root,
                app_config.backup.retention_days,
            );
            Ok(report.failed == 0)
        }
    }
}

async fn check_connection(connector: &MySqlConnector, app_config: &AppConfig) -> Result<()> {
    match utils::setting::check_db_connection(
        connector,
        &app_config.backup.databases,
        app_config.backup.dump_options.connect_timeout,
    )
    .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Connection check failed: {:#}", e);
            error!(
                "Please verify host ({}), port ({}), username ({}), password and network access",
                app_config.server.host, app_config.server.port, app_config.server.username
            );
            Err(e)
        }
    }
}
