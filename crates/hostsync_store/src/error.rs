//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`crate::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated (duplicate identity, group or membership).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced parent row does not exist (foreign key violation).
    #[error("missing parent row: {0}")]
    MissingParent(String),

    /// The SQLite backend failed.
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if this error signals a unique-constraint violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                match failure.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => StoreError::Conflict(detail),
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        StoreError::MissingParent(detail)
                    }
                    _ => StoreError::Sqlite(rusqlite::Error::SqliteFailure(failure, message)),
                }
            }
            other => StoreError::Sqlite(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        assert!(StoreError::Conflict("accounts.identity".into()).is_conflict());
        assert!(!StoreError::Backend("disk full".into()).is_conflict());
    }

    #[test]
    fn error_display() {
        let err = StoreError::MissingParent("groups.group_id".into());
        assert_eq!(err.to_string(), "missing parent row: groups.group_id");
    }
}
