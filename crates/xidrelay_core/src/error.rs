//! Error types for xidrelay core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while constructing core values.
///
/// Every variant is a configuration error: it is reported when a value is
/// built, never while a built value is being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The value is not a valid transaction id.
    #[error("{value} is an invalid transaction id")]
    InvalidTransactionId {
        /// The rejected value.
        value: u64,
    },

    /// The text could not be parsed as a transaction id.
    #[error("cannot parse transaction id from {text:?}")]
    UnparsableTransactionId {
        /// The rejected text.
        text: String,
    },

    /// An element of an outstanding-transaction list is not a transaction id.
    #[error("malformed outstanding transaction list {list:?}: element {index} is {element:?}")]
    MalformedOutstandingList {
        /// The complete list as given.
        list: String,
        /// Zero-based index of the offending element.
        index: usize,
        /// The offending element.
        element: String,
    },

    /// The snapshot's upper bound precedes its lower bound.
    #[error("snapshot max xid {max} precedes min xid {min}")]
    InvertedSnapshotBounds {
        /// The lower bound.
        min: u32,
        /// The upper bound.
        max: u32,
    },

    /// A change record carries an unknown command marker.
    #[error("unknown command type {marker:?}, expected one of I, U, D")]
    UnknownCommandType {
        /// The rejected marker.
        marker: String,
    },
}

impl CoreError {
    /// Creates an unparsable transaction id error.
    pub fn unparsable(text: impl Into<String>) -> Self {
        Self::UnparsableTransactionId { text: text.into() }
    }

    /// Creates an unknown command type error.
    pub fn unknown_command(marker: impl Into<String>) -> Self {
        Self::UnknownCommandType {
            marker: marker.into(),
        }
    }
}
