// mysql-backup/src/backup/db_dump.rs
use std::fs::OpenOptions;
use std::future::Future;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use log::{error, info};

use crate::backup::encoder::CellValue;
use crate::backup::table_dump::TableDumper;
use crate::errors::{DumpError, DumpResult};

/// Receives the rows of one table in arrival order; an error stops the scan.
pub type RowVisitor<'a> = dyn FnMut(Vec<CellValue>) -> DumpResult<()> + Send + 'a;

/// An open session scoped to one database.
#[async_trait]
pub trait Session: Send {
    /// Table names of the session's default schema, in server order.
    async fn list_tables(&mut self) -> DumpResult<Vec<String>>;

    /// The server's own `CREATE TABLE` statement for `table`, without a terminator.
    async fn create_statement(&mut self, table: &str) -> DumpResult<String>;

    /// Streams every row of `table` into `visit`, in whatever order the server returns
    /// them, without holding the whole table in memory.
    async fn for_each_row(&mut self, table: &str, visit: &mut RowVisitor<'_>) -> DumpResult<()>;

    async fn close(self: Box<Self>) -> DumpResult<()>;
}

/// Opens sessions against the configured server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// `host:port` of the server, written into dump headers.
    fn source(&self) -> String;

    async fn connect(&self, database: &str) -> DumpResult<Box<dyn Session>>;
}

#[derive(Debug, Clone, Copy)]
pub struct DumpOptions {
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpSummary {
    pub tables: usize,
    pub rows: u64,
}

/// Runs `fut` with a deadline; expiry becomes a `DumpError::Timeout`.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: impl Into<String>,
    fut: F,
) -> DumpResult<T>
where
    F: Future<Output = DumpResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DumpError::Timeout {
            operation: operation.into(),
            timeout: limit,
        }),
    }
}

/// Produces one complete dump file for one database.
///
/// The engine only produces bytes: when it fails, whatever it wrote stays on disk and
/// the caller decides what to do with it.
pub struct DumpEngine<'a> {
    connector: &'a dyn Connector,
    options: DumpOptions,
}

impl<'a> DumpEngine<'a> {
    pub fn new(connector: &'a dyn Connector, options: DumpOptions) -> Self {
        DumpEngine { connector, options }
    }

    pub async fn run(&self, database: &str, destination: &Path) -> DumpResult<DumpSummary> {
        match self.dump(database, destination).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Failed to create backup file for {}: {}", database, e);
                Err(e)
            }
        }
    }

    async fn dump(&self, database: &str, destination: &Path) -> DumpResult<DumpSummary> {
        let mut session = bounded(
            self.options.connect_timeout,
            format!("Connecting to database {}", database),
            self.connector.connect(database),
        )
        .await?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => DumpError::ArtifactExists(destination.to_path_buf()),
                _ => DumpError::Io(e),
            })?;
        let mut out = BufWriter::new(file);

        write_header(&mut out, &self.connector.source(), database)?;
        writeln!(out, "SET FOREIGN_KEY_CHECKS=0;\n")?;

        let tables = bounded(
            self.options.query_timeout,
            "SHOW TABLES",
            session.list_tables(),
        )
        .await?;

        let dumper = TableDumper::new(self.options.query_timeout);
        let mut rows: u64 = 0;
        for table in &tables {
            info!("Dumping table: {}", table);
            rows += dumper.dump(table, session.as_mut(), &mut out).await?;
        }

        writeln!(out, "SET FOREIGN_KEY_CHECKS=1;")?;

        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        bounded(
            self.options.query_timeout,
            format!("Closing session for {}", database),
            session.close(),
        )
        .await?;

        Ok(DumpSummary {
            tables: tables.len(),
            rows,
        })
    }
}

fn write_header<W: Write>(out: &mut W, source: &str, database: &str) -> DumpResult<()> {
    writeln!(out, "-- MySQL database backup")?;
    writeln!(out, "-- Host: {}", source)?;
    writeln!(out, "-- Database: {}", database)?;
    writeln!(out, "-- Backup time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "-- --------------------------------------------------------\n")?;
    Ok(())
}
