//! # xidrelay Core
//!
//! Transaction visibility model for PostgreSQL master to slave replication.
//!
//! This crate provides:
//! - [`TransactionId`] with wraparound-aware ordering
//! - [`Snapshot`] and the committed-before visibility test
//! - Committed-between iteration for advancing a replica between snapshots
//! - Row types for the transaction log and snapshot log
//!
//! It performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;
mod snapshot;
mod xid;

pub use error::{CoreError, CoreResult};
pub use record::{ChangeRecord, CommandType, SnapshotRecord};
pub use snapshot::{CommittedBetween, Snapshot, OUTSTANDING_SEPARATOR};
pub use xid::TransactionId;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
