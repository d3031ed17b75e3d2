/// Data Manager Error Module
///
/// This module defines the error taxonomy shared by every operation in the
/// crate: configuration problems, catalog misses, and database failures.
use std::fmt;
use thiserror::Error;

/// Kind of catalog object a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Schema,
    Table,
    Procedure,
    Column,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Schema => "schema",
            ObjectKind::Table => "table",
            ObjectKind::Procedure => "procedure",
            ObjectKind::Column => "column",
        };
        f.write_str(name)
    }
}

/// Error type for the data manager.
///
/// - Configuration errors (missing environment variables, bad config files)
///   fail fast and are never retried.
/// - Not-found errors come from catalog resolution and propagate to callers.
/// - Database errors propagate from the read and write paths; the statement
///   runner absorbs them into an `ExecutionOutcome` instead.
#[derive(Error, Debug)]
pub enum DataManagerError {
    /// Missing environment variables, malformed descriptors or config values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an argument that can never succeed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A schema, table or procedure is absent from the catalog
    #[error("Not found: {kind} `{name}` does not exist")]
    NotFound { kind: ObjectKind, name: String },

    /// Errors raised by the SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Statement failures reported by a driver without a native error type
    #[error("Query error: {0}")]
    Query(String),

    /// A per-chunk bulk write failed after some chunks were already committed
    #[error("Partial write: {committed_rows} rows committed before failure: {source}")]
    PartialWrite {
        committed_rows: usize,
        #[source]
        source: Box<DataManagerError>,
    },

    /// The external model generator failed or could not be started
    #[error("Code generation error: {0}")]
    Codegen(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML rendering errors
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl DataManagerError {
    pub(crate) fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        DataManagerError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True when the error came from the database rather than from input
    /// validation or catalog resolution.
    pub fn is_database(&self) -> bool {
        match self {
            DataManagerError::Database(_) | DataManagerError::Query(_) => true,
            DataManagerError::PartialWrite { source, .. } => source.is_database(),
            _ => false,
        }
    }
}

/// Type alias for Result to use DataManagerError as the error type.
pub type Result<T> = std::result::Result<T, DataManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = DataManagerError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let config_err = DataManagerError::Config("missing variable".to_string());
        assert!(config_err.to_string().contains("Configuration error"));

        let missing = DataManagerError::not_found(ObjectKind::Schema, "datafeeds");
        assert_eq!(
            missing.to_string(),
            "Not found: schema `datafeeds` does not exist"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DataManagerError = io_err.into();
        match err {
            DataManagerError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: DataManagerError = json_err.into();
        match err {
            DataManagerError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }

    #[test]
    fn test_partial_write_classification() {
        let err = DataManagerError::PartialWrite {
            committed_rows: 10,
            source: Box::new(DataManagerError::Query("constraint failed".to_string())),
        };
        assert!(err.is_database());
        assert!(err.to_string().contains("10 rows committed"));
        assert!(!DataManagerError::Config("x".to_string()).is_database());
    }
}
