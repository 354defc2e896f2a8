//! Error types for PostgreSQL access.

use std::io;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur talking to PostgreSQL.
#[derive(Debug, Error)]
pub enum PgError {
    /// The connection could not be established.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// The connection string, with any password removed.
        url: String,
        /// The driver error.
        #[source]
        source: tokio_postgres::Error,
    },

    /// A statement failed.
    #[error("database error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// The private runtime could not be built.
    #[error("runtime error: {0}")]
    Runtime(#[from] io::Error),

    /// A name is not usable as an unquoted SQL identifier.
    #[error("invalid SQL identifier {0:?}")]
    InvalidIdentifier(String),
}

impl PgError {
    /// Creates an invalid identifier error.
    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier(name.into())
    }
}
