//! Database error types for panel-db.

use panel_core::StoreError;
use thiserror::Error;

/// SQLite primary result code for constraint violations.
const SQLITE_CONSTRAINT: i32 = 19;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned unparseable data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::LibSql(libsql::Error::SqliteFailure(code, message))
                if code & 0xff == SQLITE_CONSTRAINT =>
            {
                Self::Rejected(message)
            }
            other => Self::Backend(other.to_string()),
        }
    }
}
