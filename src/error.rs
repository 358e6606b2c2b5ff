//! Error types for the termassist crate.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error from the underlying SQLite database.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database file or its directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An ad-hoc query was rejected because it could modify the store.
    #[error("Only read-only queries are allowed: {0}")]
    ReadOnly(String),

    /// An ad-hoc query contained more than one statement.
    #[error("Only a single statement is allowed: {0}")]
    MultipleStatements(String),
}

impl StorageError {
    /// Whether the error is transient lock contention from another process.
    pub fn is_locked(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> StorageError {
        StorageError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            Some("simulated".to_string()),
        ))
    }

    #[test]
    fn test_busy_and_locked_are_locked() {
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_locked());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).is_locked());
    }

    #[test]
    fn test_other_errors_are_not_locked() {
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_READONLY).is_locked());
        assert!(!StorageError::ReadOnly("DELETE".into()).is_locked());
    }
}
