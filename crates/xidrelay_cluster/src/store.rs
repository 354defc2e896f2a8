//! Stored topology records.
//!
//! A [`TopologyStore`] hands the registry plain records; the registry turns
//! them into live [`crate::Cluster`] and [`crate::Node`] values. The JSON
//! form read by [`MemoryTopologyStore::from_json`] lists nodes once and has
//! clusters refer to them by id:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": 1, "name": "primary", "uri": "host=db1 dbname=app" },
//!     { "id": 2, "name": "replica", "uri": "host=db2 dbname=app",
//!       "include_table": "public\\..*" }
//!   ],
//!   "clusters": [
//!     { "id": 1, "name": "east", "master": 1, "slaves": [2] }
//!   ]
//! }
//! ```

use crate::error::{ClusterError, ClusterResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// A stored node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Globally unique id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Connection URI.
    #[serde(default)]
    pub uri: String,
    /// Include-table pattern; unset matches every table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_table: Option<String>,
    /// Initial availability.
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// A stored cluster with its nodes resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRecord {
    /// Cluster id.
    pub id: u64,
    /// Cluster name.
    pub name: String,
    /// The master node.
    pub master: NodeRecord,
    /// Slave nodes.
    pub slaves: Vec<NodeRecord>,
}

/// Source of stored topology.
pub trait TopologyStore: Send + Sync {
    /// Loads every cluster.
    fn load_all(&self) -> ClusterResult<Vec<ClusterRecord>>;

    /// Loads one cluster by name. `Ok(None)` if it is not stored.
    fn load(&self, name: &str) -> ClusterResult<Option<ClusterRecord>>;
}

/// File form of a topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyDocument {
    /// Every node, listed once.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Every cluster.
    #[serde(default)]
    pub clusters: Vec<ClusterEntry>,
}

/// A cluster in a [`TopologyDocument`], referring to nodes by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterEntry {
    /// Cluster id.
    pub id: u64,
    /// Cluster name.
    pub name: String,
    /// Master node id.
    pub master: u64,
    /// Slave node ids.
    #[serde(default)]
    pub slaves: Vec<u64>,
}

impl TopologyDocument {
    /// Resolves node references.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Topology`] for duplicate node ids, duplicate
    /// cluster names, or a reference to an unknown node.
    pub fn resolve(&self) -> ClusterResult<Vec<ClusterRecord>> {
        let mut nodes = BTreeMap::new();
        for node in &self.nodes {
            if nodes.insert(node.id, node).is_some() {
                return Err(ClusterError::topology(format!("duplicate node id {}", node.id)));
            }
        }
        let lookup = |cluster: &str, id: u64| {
            nodes.get(&id).map(|n| (*n).clone()).ok_or_else(|| {
                ClusterError::topology(format!("cluster {cluster} refers to unknown node {id}"))
            })
        };

        let mut names = BTreeMap::new();
        let mut out = Vec::with_capacity(self.clusters.len());
        for entry in &self.clusters {
            if names.insert(entry.name.as_str(), entry.id).is_some() {
                return Err(ClusterError::topology(format!(
                    "duplicate cluster name {}",
                    entry.name
                )));
            }
            out.push(ClusterRecord {
                id: entry.id,
                name: entry.name.clone(),
                master: lookup(&entry.name, entry.master)?,
                slaves: entry
                    .slaves
                    .iter()
                    .map(|id| lookup(&entry.name, *id))
                    .collect::<ClusterResult<_>>()?,
            });
        }
        Ok(out)
    }
}

/// A [`TopologyStore`] held in memory.
///
/// Clusters can be added after a registry has opened, to exercise lazy
/// loading, and loads can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryTopologyStore {
    clusters: RwLock<BTreeMap<String, ClusterRecord>>,
    failing: AtomicBool,
}

impl MemoryTopologyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a resolved document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not resolve.
    pub fn from_document(document: &TopologyDocument) -> ClusterResult<Self> {
        let store = Self::new();
        for record in document.resolve()? {
            store.put(record);
        }
        Ok(store)
    }

    /// Parses a JSON topology document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an inconsistent document.
    pub fn from_json(text: &str) -> ClusterResult<Self> {
        let document: TopologyDocument = serde_json::from_str(text)?;
        Self::from_document(&document)
    }

    /// Reads a JSON topology document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> ClusterResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Stores or replaces a cluster.
    pub fn put(&self, record: ClusterRecord) {
        self.clusters.write().insert(record.name.clone(), record);
    }

    /// Makes every subsequent load fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> ClusterResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ClusterError::topology("topology store unavailable"))
        } else {
            Ok(())
        }
    }
}

impl TopologyStore for MemoryTopologyStore {
    fn load_all(&self) -> ClusterResult<Vec<ClusterRecord>> {
        self.check()?;
        Ok(self.clusters.read().values().cloned().collect())
    }

    fn load(&self, name: &str) -> ClusterResult<Option<ClusterRecord>> {
        self.check()?;
        Ok(self.clusters.read().get(name).cloned())
    }
}
