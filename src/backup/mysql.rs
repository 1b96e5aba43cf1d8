// mysql-backup/src/backup/mysql.rs
use async_trait::async_trait;
use futures::TryStreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row, TypeInfo};

use crate::backup::db_dump::{Connector, RowVisitor, Session};
use crate::backup::encoder::CellValue;
use crate::backup::table_dump::quote_ident;
use crate::errors::{DumpError, DumpResult};

/// Server address and credentials. The password is never logged.
#[derive(Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub struct MySqlConnector {
    params: ConnectionParams,
}

impl MySqlConnector {
    pub fn new(params: ConnectionParams) -> Self {
        MySqlConnector { params }
    }

    fn options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.params.host)
            .port(self.params.port)
            .username(&self.params.username)
            .password(&self.params.password)
            .charset("utf8mb4")
            // Keep the server's own time zone so TIMESTAMP text reloads unchanged.
            .timezone(None::<String>)
    }

    /// Connects without a default schema, runs `SELECT 1` and returns the server's
    /// database names.
    pub async fn probe(&self) -> DumpResult<Vec<String>> {
        let mut conn = MySqlConnection::connect_with(&self.options())
            .await
            .map_err(DumpError::ServerConnect)?;

        sqlx::query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(|e| DumpError::query("SELECT 1", e))?;

        let rows = sqlx::query("SHOW DATABASES")
            .fetch_all(&mut conn)
            .await
            .map_err(|e| DumpError::query("SHOW DATABASES", e))?;
        let names = first_column(&rows, "SHOW DATABASES")?;

        conn.close()
            .await
            .map_err(|e| DumpError::query("COM_QUIT", e))?;
        Ok(names)
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn source(&self) -> String {
        format!("{}:{}", self.params.host, self.params.port)
    }

    async fn connect(&self, database: &str) -> DumpResult<Box<dyn Session>> {
        let conn = MySqlConnection::connect_with(&self.options().database(database))
            .await
            .map_err(|source| DumpError::Connect {
                database: database.to_string(),
                source,
            })?;
        Ok(Box::new(MySqlSession { conn }))
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl Session for MySqlSession {
    async fn list_tables(&mut self) -> DumpResult<Vec<String>> {
        let rows = sqlx::query("SHOW TABLES")
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DumpError::query("SHOW TABLES", e))?;
        first_column(&rows, "SHOW TABLES")
    }

    async fn create_statement(&mut self, table: &str) -> DumpResult<String> {
        let query = format!("SHOW CREATE TABLE {}", quote_ident(table));
        let row = sqlx::query(&query)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| DumpError::query(query.as_str(), e))?;
        // Column 0 is the table name, column 1 the statement.
        row.try_get_unchecked::<String, _>(1)
            .map_err(|e| DumpError::query(query.as_str(), e))
    }

    async fn for_each_row(&mut self, table: &str, visit: &mut RowVisitor<'_>) -> DumpResult<()> {
        let query = format!("SELECT * FROM {}", quote_ident(table));
        // A bare string carries no arguments, so it runs over the text protocol and
        // every value arrives exactly as the server renders it.
        let mut rows = (&mut self.conn).fetch(query.as_str());
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| DumpError::query(query.as_str(), e))?
        {
            let cells = (0..row.columns().len())
                .map(|index| decode_cell(table, &row, index))
                .collect::<DumpResult<Vec<CellValue>>>()?;
            visit(cells)?;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> DumpResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DumpError::query("COM_QUIT", e))
    }
}

fn first_column(rows: &[MySqlRow], query: &str) -> DumpResult<Vec<String>> {
    rows.iter()
        .map(|row| row.try_get_unchecked::<String, _>(0))
        .collect::<Result<_, _>>()
        .map_err(|e| DumpError::query(query, e))
}

lazy_static! {
    static ref NUMERIC: Regex = Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap();
}

/// How the text of a column is turned into a `CellValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Signed,
    Unsigned,
    /// Written back verbatim and unquoted.
    Numeric,
    /// Strings, temporal values, JSON, ENUM and SET.
    Text,
    Bytes,
}

impl CellKind {
    /// Maps a column type name as reported by sqlx. `TINYINT(1)` columns are reported as
    /// `BOOLEAN` but may hold any TINYINT value.
    fn of(type_name: &str) -> Self {
        let type_name = type_name.to_ascii_uppercase();
        let unsigned = type_name.ends_with(" UNSIGNED");
        match type_name.trim_end_matches(" UNSIGNED") {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" if unsigned => {
                CellKind::Unsigned
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" | "BOOLEAN" => {
                CellKind::Signed
            }
            "DECIMAL" | "FLOAT" | "DOUBLE" => CellKind::Numeric,
            "BIT" | "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => CellKind::Bytes,
            _ => CellKind::Text,
        }
    }
}

fn decode_cell(table: &str, row: &MySqlRow, index: usize) -> DumpResult<CellValue> {
    let column = &row.columns()[index];
    let decode_error = |detail: String| DumpError::Decode {
        table: table.to_string(),
        column: column.name().to_string(),
        detail,
    };

    let kind = CellKind::of(column.type_info().name());
    let raw = row
        .try_get_unchecked::<Option<Vec<u8>>, _>(index)
        .map_err(|e| decode_error(e.to_string()))?;
    cell_from_text(kind, raw).map_err(decode_error)
}

/// Builds a cell from the raw text-protocol bytes of one value; `None` is SQL NULL.
fn cell_from_text(kind: CellKind, raw: Option<Vec<u8>>) -> Result<CellValue, String> {
    let Some(bytes) = raw else {
        return Ok(CellValue::Null);
    };

    match kind {
        CellKind::Bytes => Ok(CellValue::Bytes(bytes)),
        CellKind::Text => match String::from_utf8(bytes) {
            Ok(text) => Ok(CellValue::Text(text)),
            // Not valid UTF-8: keep the exact bytes.
            Err(e) => Ok(CellValue::Bytes(e.into_bytes())),
        },
        CellKind::Signed => {
            let text = utf8(bytes)?;
            text.parse::<i64>()
                .map(CellValue::Int)
                .map_err(|e| format!("'{}' is not an integer: {}", text, e))
        }
        CellKind::Unsigned => {
            let text = utf8(bytes)?;
            text.parse::<u64>()
                .map(CellValue::UInt)
                .map_err(|e| format!("'{}' is not an unsigned integer: {}", text, e))
        }
        CellKind::Numeric => {
            let text = utf8(bytes)?;
            if NUMERIC.is_match(&text) {
                Ok(CellValue::Numeric(text))
            } else {
                Err(format!("'{}' is not a numeric literal", text))
            }
        }
    }
}

fn utf8(bytes: Vec<u8>) -> Result<String, String> {
    String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))
}
