//! Test fixtures.
//!
//! Shared catalogs, topologies and log stores used across the workspace's
//! tests.

use chrono::Duration;
use std::path::PathBuf;
use tempfile::TempDir;
use xidrelay_cluster::{ClusterRegistry, MemorySchemaCatalog, MemoryTopologyStore};
use xidrelay_core::{Snapshot, TransactionId};
use xidrelay_logstore::{LogStore, LogStoreConfig, MemoryGenerationCatalog};

/// Schema whose tables the `regextest` pattern selects.
pub const REGEXTEST_SCHEMA: &str = "regextest";

/// Tables of [`REGEXTEST_SCHEMA`].
pub const REGEXTEST_TABLES: &[&str] = &["orange", "blue", "green", "red"];

/// Second schema of the `regextest` catalog.
pub const REGEXTEST_S2_SCHEMA: &str = "regextest_s2";

/// Tables of [`REGEXTEST_S2_SCHEMA`].
pub const REGEXTEST_S2_TABLES: &[&str] = &["orange2", "blue2", "green2", "red2"];

/// Include pattern selecting exactly the [`REGEXTEST_SCHEMA`] tables.
pub const REGEXTEST_PATTERN: &str = r"regextest\..*";

/// Catalog with both `regextest` schemas plus tables in schemas the
/// replication strategy ignores by default.
pub fn regextest_catalog() -> MemorySchemaCatalog {
    let catalog = MemorySchemaCatalog::new();
    for table in REGEXTEST_TABLES {
        catalog.add_table(REGEXTEST_SCHEMA, *table);
    }
    for table in REGEXTEST_S2_TABLES {
        catalog.add_table(REGEXTEST_S2_SCHEMA, *table);
    }
    catalog.add_table("pg_catalog", "pg_class");
    catalog.add_table("information_schema", "tables");
    catalog.add_table("bruce", "currentlog");
    catalog.add_table("bruce", "transactionlog_1");
    catalog
}

/// Qualified names of the tables in `schema` of [`regextest_catalog`].
pub fn regextest_qualified(schema: &str) -> Vec<String> {
    let tables: &[&str] = match schema {
        REGEXTEST_SCHEMA => REGEXTEST_TABLES,
        REGEXTEST_S2_SCHEMA => REGEXTEST_S2_TABLES,
        _ => &[],
    };
    let mut names: Vec<String> = tables.iter().map(|t| format!("{schema}.{t}")).collect();
    names.sort();
    names
}

/// Two clusters sharing a replica, in the topology file format.
///
/// `east` has master `primary` and slaves `replica-a` (limited to
/// [`REGEXTEST_PATTERN`]) and `replica-b`; `west` has master `replica-b`
/// and slave `replica-a`.
pub const SAMPLE_TOPOLOGY: &str = r#"{
    "nodes": [
        { "id": 1, "name": "primary", "uri": "host=db1 dbname=app" },
        { "id": 2, "name": "replica-a", "uri": "host=db2 dbname=app", "include_table": "regextest\\..*" },
        { "id": 3, "name": "replica-b", "uri": "host=db3 dbname=app" }
    ],
    "clusters": [
        { "id": 1, "name": "east", "master": 1, "slaves": [2, 3] },
        { "id": 2, "name": "west", "master": 3, "slaves": [2] }
    ]
}"#;

/// A registry over [`SAMPLE_TOPOLOGY`].
pub fn sample_registry() -> ClusterRegistry<MemoryTopologyStore> {
    let store = MemoryTopologyStore::from_json(SAMPLE_TOPOLOGY).expect("sample topology parses");
    ClusterRegistry::open(store).expect("sample topology opens")
}

/// Writes [`SAMPLE_TOPOLOGY`] to a temporary file.
///
/// Keep the directory alive for as long as the path is used.
pub fn sample_topology_file() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("topology.json");
    std::fs::write(&path, SAMPLE_TOPOLOGY).expect("Failed to write topology");
    (dir, path)
}

/// Shorthand for a transaction id.
pub fn xid(value: u64) -> TransactionId {
    TransactionId::new(value).expect("fixture ids are valid")
}

/// Shorthand for a snapshot with explicit outstanding ids.
pub fn snapshot(current: u64, min: u64, max: u64, outstanding: &[u64]) -> Snapshot {
    Snapshot::new(
        xid(current),
        xid(min),
        xid(max),
        outstanding.iter().map(|v| xid(*v)),
    )
    .expect("fixture bounds are ordered")
}

/// A log store over a fresh memory catalog with short intervals.
///
/// Returns the catalog handle too, for driving its clock.
pub fn hourly_log_store(
    rotate_hours: i64,
    retain_hours: i64,
) -> (LogStore<MemoryGenerationCatalog>, MemoryGenerationCatalog) {
    let catalog = MemoryGenerationCatalog::new();
    let config = LogStoreConfig::new()
        .rotate_interval(hours(rotate_hours))
        .retain_interval(hours(retain_hours))
        .tick_delay(std::time::Duration::from_millis(10));
    let store = LogStore::new(catalog.clone(), config).expect("fixture config is valid");
    (store, catalog)
}

fn hours(h: i64) -> std::time::Duration {
    Duration::hours(h).to_std().expect("positive hours")
}
