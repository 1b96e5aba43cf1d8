use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of a single database dump. Each one is contained at the database level and
/// recorded as a failed outcome by the orchestrator.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Connection to database '{database}' failed: {source}")]
    Connect {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection to server failed: {0}")]
    ServerConnect(#[source] sqlx::Error),

    #[error("Query failed ({query}): {source}")]
    Query {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup file already exists: {}", .0.display())]
    ArtifactExists(PathBuf),

    #[error("Could not decode column '{column}' of table '{table}': {detail}")]
    Decode {
        table: String,
        column: String,
        detail: String,
    },
}

impl DumpError {
    pub fn query(query: impl Into<String>, source: sqlx::Error) -> Self {
        DumpError::Query {
            query: query.into(),
            source,
        }
    }
}

pub type DumpResult<T> = std::result::Result<T, DumpError>;
