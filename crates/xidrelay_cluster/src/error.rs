//! Error types for cluster topology.

use std::error::Error as StdError;
use std::io;
use thiserror::Error;
use xidrelay_pg::PgError;

/// Result type for topology operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur building or resolving topology.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A cluster could not be constructed.
    #[error("{}", initialization_text(.message, .source))]
    Initialization {
        /// What was being initialized.
        message: Option<String>,
        /// The underlying failure.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// A cluster name is empty or blank.
    #[error("invalid cluster name {0:?}")]
    InvalidClusterName(String),

    /// A node's include-table pattern does not compile.
    #[error("invalid include-table pattern {pattern:?}: {source}")]
    InvalidIncludeTable {
        /// The rejected pattern.
        pattern: String,
        /// The compilation error.
        #[source]
        source: regex::Error,
    },

    /// Stored topology is inconsistent.
    #[error("invalid topology: {0}")]
    Topology(String),

    /// The catalog query failed.
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),

    /// A topology file could not be parsed.
    #[error("invalid topology file: {0}")]
    Json(#[from] serde_json::Error),

    /// A topology file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClusterError {
    /// Creates an initialization error with a message.
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: Some(message.into()),
            source: None,
        }
    }

    /// Creates an initialization error with a message and cause.
    pub fn initialization_caused_by(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Initialization {
            message: Some(message.into()),
            source: Some(source.into()),
        }
    }

    /// Creates a topology error.
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology(message.into())
    }

    /// Returns true for configuration errors, which are reported when a
    /// value is built rather than when it is used.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidClusterName(_) | Self::InvalidIncludeTable { .. } | Self::Topology(_)
        )
    }
}

fn initialization_text(
    message: &Option<String>,
    source: &Option<Box<dyn StdError + Send + Sync>>,
) -> String {
    match (message, source) {
        (Some(m), Some(s)) => format!("cluster initialization failed: {m}: {s}"),
        (Some(m), None) => format!("cluster initialization failed: {m}"),
        (None, Some(s)) => format!("cluster initialization failed: {s}"),
        (None, None) => "cluster initialization failed".to_string(),
    }
}
