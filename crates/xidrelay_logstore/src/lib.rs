//! # xidrelay Log Store
//!
//! Time-partitioned transaction log and snapshot log tables.
//!
//! Captured changes are written to the newest *generation* of tables. A
//! [`LogStore`] creates a new generation once the newest one is older than
//! the rotation interval, drops the oldest one once it is older than the
//! retention interval (never the last one), and keeps one union view per log
//! over every live generation. [`LogSwitchWorker`] runs that cycle on a
//! background thread.
//!
//! ```rust
//! use xidrelay_logstore::{LogStore, LogStoreConfig, MemoryGenerationCatalog};
//!
//! let catalog = MemoryGenerationCatalog::new();
//! let mut store = LogStore::new(catalog.clone(), LogStoreConfig::default()).unwrap();
//! let outcome = store.tick().unwrap();
//! assert_eq!(outcome.created.map(|g| g.id), Some(1));
//! assert_eq!(catalog.generation_ids(), vec![1]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod error;
mod generation;
mod memory;
mod postgres;
mod store;
mod worker;

pub use catalog::{grant_read_ddl, snapshot_table_ddl, transaction_table_ddl, union_view_ddl, GenerationCatalog};
pub use config::{
    LogStoreConfig, LogStoreSettings, DEFAULT_CATALOG_TABLE, DEFAULT_RETAIN_MINUTES,
    DEFAULT_ROTATE_MINUTES, DEFAULT_SNAPSHOT_VIEW, DEFAULT_TICK_DELAY_MS,
    DEFAULT_TRANSACTION_VIEW,
};
pub use error::{LogStoreError, LogStoreResult};
pub use generation::{generation_table, LogGeneration};
pub use memory::{CatalogOp, MemoryGenerationCatalog};
pub use postgres::PgGenerationCatalog;
pub use store::{LogStore, LogStoreState, TickOutcome};
pub use worker::{LogSwitchHandle, LogSwitchWorker};
