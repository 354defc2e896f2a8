//! Error types for the log store.

use std::io;
use thiserror::Error;
use xidrelay_pg::PgError;

/// Result type for log store operations.
pub type LogStoreResult<T> = Result<T, LogStoreError>;

/// Errors that can occur managing log generations.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// The database rejected a statement or the connection failed.
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),

    /// A catalog operation failed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// A table cannot be dropped while a view still selects from it.
    #[error("table {table} is still referenced by view {view}")]
    TableInUse {
        /// The table being dropped.
        table: String,
        /// The view that references it.
        view: String,
    },

    /// A table or view that should exist does not.
    #[error("no such relation: {0}")]
    MissingRelation(String),

    /// A relation that is about to be created already exists.
    #[error("relation already exists: {0}")]
    DuplicateRelation(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A settings file could not be parsed.
    #[error("invalid settings file: {0}")]
    Settings(#[from] serde_json::Error),

    /// A settings file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The background worker panicked.
    #[error("log switch worker panicked")]
    WorkerPanicked,
}

impl LogStoreError {
    /// Creates a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if this error must stop a running log switch worker.
    ///
    /// Persistence failures are fatal. Configuration problems are reported
    /// before a worker starts and never stop one.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidConfig(_) | Self::Settings(_) | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(LogStoreError::catalog("boom").is_fatal());
        assert!(LogStoreError::MissingRelation("bruce.x".into()).is_fatal());
        assert!(LogStoreError::WorkerPanicked.is_fatal());
        assert!(!LogStoreError::invalid_config("zero interval").is_fatal());
    }

    #[test]
    fn error_display() {
        let err = LogStoreError::TableInUse {
            table: "bruce.snapshotlog_1".into(),
            view: "bruce.snapshotlog".into(),
        };
        assert_eq!(
            err.to_string(),
            "table bruce.snapshotlog_1 is still referenced by view bruce.snapshotlog"
        );
    }
}
