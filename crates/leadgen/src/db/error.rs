//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value does not map back onto a domain type.
    #[error("Invalid value in column '{column}': {reason}")]
    InvalidData { column: &'static str, reason: String },
}

impl DatabaseError {
    pub(crate) fn invalid(column: &'static str, reason: impl ToString) -> Self {
        DatabaseError::InvalidData {
            column,
            reason: reason.to_string(),
        }
    }
}
