//! In-memory `Connector`/`Session` used by the unit tests of the dump and backup layers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::backup::db_dump::{Connector, RowVisitor, Session};
use crate::backup::encoder::CellValue;
use crate::errors::{DumpError, DumpResult};

#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    create: String,
    rows: Vec<Vec<CellValue>>,
    fail_after: Option<usize>,
    delay: Option<Duration>,
}

impl MemoryTable {
    pub fn new(name: &str, create: &str) -> Self {
        MemoryTable {
            name: name.to_string(),
            create: create.to_string(),
            rows: Vec::new(),
            fail_after: None,
            delay: None,
        }
    }

    pub fn row(mut self, row: Vec<CellValue>) -> Self {
        self.rows.push(row);
        self
    }

    /// Fetching rows of this table fails as if the connection dropped.
    pub fn failing_rows(self) -> Self {
        self.failing_after(0)
    }

    /// Delivers `rows` rows, then the connection drops.
    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }

    /// Fetching rows of this table takes `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub struct MemorySession {
    tables: Vec<MemoryTable>,
}

impl MemorySession {
    pub fn new(tables: Vec<MemoryTable>) -> Self {
        MemorySession { tables }
    }

    fn table(&self, name: &str) -> DumpResult<&MemoryTable> {
        self.tables.iter().find(|t| t.name == name).ok_or_else(|| {
            DumpError::query(
                format!("SHOW CREATE TABLE `{}`", name),
                sqlx::Error::Protocol(format!("Table '{}' doesn't exist", name)),
            )
        })
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn list_tables(&mut self) -> DumpResult<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn create_statement(&mut self, table: &str) -> DumpResult<String> {
        Ok(self.table(table)?.create.clone())
    }

    async fn for_each_row(&mut self, table: &str, visit: &mut RowVisitor<'_>) -> DumpResult<()> {
        let table = self.table(table)?.clone();
        if let Some(delay) = table.delay {
            tokio::time::sleep(delay).await;
        }
        let lost = || {
            DumpError::query(
                format!("SELECT * FROM `{}`", table.name),
                sqlx::Error::Protocol("Lost connection to MySQL server during query".into()),
            )
        };
        for (index, row) in table.rows.iter().enumerate() {
            if table.fail_after == Some(index) {
                return Err(lost());
            }
            visit(row.clone())?;
        }
        if table.fail_after.is_some_and(|n| n >= table.rows.len()) {
            return Err(lost());
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> DumpResult<()> {
        Ok(())
    }
}

/// Databases that are not registered fail to connect.
#[derive(Default)]
pub struct MemoryConnector {
    databases: HashMap<String, Vec<MemoryTable>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        MemoryConnector::default()
    }

    pub fn database(mut self, name: &str, tables: Vec<MemoryTable>) -> Self {
        self.databases.insert(name.to_string(), tables);
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn source(&self) -> String {
        "memory:3306".to_string()
    }

    async fn connect(&self, database: &str) -> DumpResult<Box<dyn Session>> {
        match self.databases.get(database) {
            Some(tables) => Ok(Box::new(MemorySession::new(tables.clone()))),
            None => Err(DumpError::Connect {
                database: database.to_string(),
                source: sqlx::Error::Protocol(format!("Unknown database '{}'", database)),
            }),
        }
    }
}
