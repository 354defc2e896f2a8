//! Log generations.

use crate::config::LogStoreConfig;
use chrono::NaiveDateTime;
use std::fmt;

/// One rotation epoch of the transaction and snapshot logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGeneration {
    /// Catalog row id. Grows with every rotation.
    pub id: i64,
    /// When the catalog row was inserted.
    pub created_at: NaiveDateTime,
    /// Backing table of the transaction log view.
    pub transaction_table: String,
    /// Backing table of the snapshot log view.
    pub snapshot_table: String,
}

impl LogGeneration {
    /// Describes generation `id`, deriving its table names from `config`.
    #[must_use]
    pub fn new(id: i64, created_at: NaiveDateTime, config: &LogStoreConfig) -> Self {
        Self {
            id,
            created_at,
            transaction_table: generation_table(&config.transaction_view_name(), id),
            snapshot_table: generation_table(&config.snapshot_view_name(), id),
        }
    }

    /// Returns true once `now` is strictly past `created_at + interval`.
    #[must_use]
    pub fn is_older_than(&self, now: NaiveDateTime, interval: chrono::Duration) -> bool {
        self.created_at
            .checked_add_signed(interval)
            .map_or(false, |deadline| now > deadline)
    }
}

impl fmt::Display for LogGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "generation {} ({}, {})", self.id, self.transaction_table, self.snapshot_table)
    }
}

/// Name of the table backing `view` for generation `id`.
#[must_use]
pub fn generation_table(view: &str, id: i64) -> String {
    format!("{view}_{id}")
}
