// mysql-backup/src/backup/table_dump.rs
use std::io::Write;
use std::time::Duration;

use log::debug;

use crate::backup::db_dump::{Session, bounded};
use crate::backup::encoder::{CellValue, encode_row};
use crate::errors::DumpResult;

/// Quotes an identifier with backticks, doubling any backtick inside it.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Writes the structure block and (for non-empty tables) the data block of one table.
pub struct TableDumper {
    query_timeout: Duration,
}

impl TableDumper {
    pub fn new(query_timeout: Duration) -> Self {
        TableDumper { query_timeout }
    }

    /// Dumps `table` into `sink` and returns the number of rows written.
    ///
    /// Any session or write error aborts the table (and with it the whole database dump);
    /// nothing is retried here.
    pub async fn dump<W: Write + Send>(
        &self,
        table: &str,
        session: &mut dyn Session,
        sink: &mut W,
    ) -> DumpResult<u64> {
        let quoted = quote_ident(table);

        let create = bounded(
            self.query_timeout,
            format!("SHOW CREATE TABLE {}", quoted),
            session.create_statement(table),
        )
        .await?;

        writeln!(sink, "-- Table structure: {}", table)?;
        writeln!(sink, "DROP TABLE IF EXISTS {};", quoted)?;
        writeln!(sink, "{};\n", create)?;

        let mut written: u64 = 0;
        bounded(
            self.query_timeout,
            format!("SELECT * FROM {}", quoted),
            session.for_each_row(table, &mut |row: Vec<CellValue>| -> DumpResult<()> {
                if written == 0 {
                    writeln!(sink, "-- Table data: {}", table)?;
                    writeln!(sink, "INSERT INTO {} VALUES", quoted)?;
                } else {
                    writeln!(sink, ",")?;
                }
                write!(sink, "{}", encode_row(&row))?;
                written += 1;
                Ok(())
            }),
        )
        .await?;

        if written == 0 {
            debug!("Table {} is empty, no data block written", table);
            return Ok(0);
        }

        writeln!(sink, ";\n")?;
        Ok(written)
    }
}
