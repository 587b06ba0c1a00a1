//! Data sources backing the record navigator
//!
//! Implementations of `rn_core::DataSource`: an in-memory source for
//! fixtures and non-paged use, a SQLite-backed source for real tables, and
//! a retrying decorator that owns transient-failure retry so the navigator
//! never has to.

pub mod memory;
pub mod retry;
pub mod sqlite;

use thiserror::Error;

// Re-exports
pub use memory::MemorySource;
pub use retry::{RetryPolicy, RetryingSource};
pub use sqlite::SqliteSource;

/// Errors that can occur in data source operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("table '{0}' has no columns")]
    EmptyTable(String),

    #[error("other error: {0}")]
    Other(String),
}

impl From<rusqlite::Error> for DataError {
    fn from(error: rusqlite::Error) -> Self {
        DataError::Sqlite(error.to_string())
    }
}

impl DataError {
    /// Whether a retry at the source boundary could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Io(_) => true,
            DataError::Sqlite(message) => {
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}
