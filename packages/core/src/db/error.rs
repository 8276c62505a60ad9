//! Database Error Types
//!
//! Failures of the libsql layer: opening the database file, creating the
//! application tables, running store queries and reading dataset rows.

use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The database file could not be opened or connected to
    #[error("Cannot open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libsql::Error,
    },

    /// The directory meant to hold the database file could not be created
    #[error("Cannot create data directory for {path}: {source}")]
    DataDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Creating one of the application tables or indexes failed
    #[error("Failed to create {object}: {source}")]
    Schema {
        object: &'static str,
        #[source]
        source: libsql::Error,
    },

    /// A store statement failed; `action` reads as "list overrides"
    #[error("Failed to {action}: {source}")]
    Query {
        action: String,
        #[source]
        source: libsql::Error,
    },

    /// A dataset table name that is not a plain identifier
    #[error("Invalid dataset table name: {0}")]
    InvalidTableName(String),

    /// A stored row could not be converted into a model
    #[error("Invalid row in {table}: {context}")]
    InvalidRow { table: String, context: String },
}

impl DatabaseError {
    pub fn open(path: PathBuf, source: libsql::Error) -> Self {
        Self::Open { path, source }
    }

    pub fn data_directory(path: PathBuf, source: std::io::Error) -> Self {
        Self::DataDirectory { path, source }
    }

    pub fn schema(object: &'static str, source: libsql::Error) -> Self {
        Self::Schema { object, source }
    }

    /// Wrap a failed statement with what it was trying to do
    pub fn query(action: impl Into<String>, source: libsql::Error) -> Self {
        Self::Query {
            action: action.into(),
            source,
        }
    }

    pub fn invalid_row(table: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidRow {
            table: table.into(),
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_query_error_reads_as_action() {
        let err = DatabaseError::query(
            "list overrides",
            libsql::Error::ConnectionFailed("closed".to_string()),
        );
        let message = err.to_string();
        assert!(message.starts_with("Failed to list overrides: "), "{}", message);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_dataset_error_messages() {
        let err = DatabaseError::InvalidTableName("bad-name".to_string());
        assert_eq!(err.to_string(), "Invalid dataset table name: bad-name");
        let err = DatabaseError::invalid_row("funguild", "bad level");
        assert_eq!(err.to_string(), "Invalid row in funguild: bad level");
    }

    #[test]
    fn test_data_directory_keeps_io_kind() {
        let err = DatabaseError::data_directory(
            PathBuf::from("/readonly/guildscope.db"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let source = err.source().and_then(|s| s.downcast_ref::<std::io::Error>());
        assert_eq!(
            source.map(|e| e.kind()),
            Some(std::io::ErrorKind::PermissionDenied)
        );
    }
}
