//! Process-wide cluster registry.

use crate::cluster::{Cluster, ClusterId};
use crate::error::{ClusterError, ClusterResult};
use crate::node::{Node, NodeId, MATCH_ALL};
use crate::store::{ClusterRecord, NodeRecord, TopologyStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hands out live clusters by name.
///
/// Implementations guarantee at most one live [`Cluster`] per name.
pub trait ClusterFactory: Send + Sync {
    /// Returns the cluster called `name`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidClusterName`] for a blank name and
    /// [`ClusterError::Initialization`] if the cluster cannot be built.
    fn cluster(&self, name: &str) -> ClusterResult<Arc<Cluster>>;

    /// Every live cluster, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Initialization`] after [`close`](Self::close).
    fn all_clusters(&self) -> ClusterResult<Vec<Arc<Cluster>>>;

    /// The live node called `name`, if any cluster uses one.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Initialization`] after [`close`](Self::close).
    fn node(&self, name: &str) -> ClusterResult<Option<Arc<Node>>>;

    /// Releases every cluster. Later lookups fail.
    fn close(&self);
}

#[derive(Default)]
struct Live {
    clusters: BTreeMap<String, Arc<Cluster>>,
    nodes: HashMap<NodeId, Arc<Node>>,
}

impl Live {
    fn node(
        &self,
        pending: &mut HashMap<NodeId, Arc<Node>>,
        record: &NodeRecord,
    ) -> ClusterResult<Arc<Node>> {
        let id = NodeId(record.id);
        if let Some(node) = self.nodes.get(&id).or_else(|| pending.get(&id)) {
            if diverges(node, record) {
                warn!(
                    node = %id,
                    name = %record.name,
                    "stored node differs from live node, keeping live settings"
                );
            }
            return Ok(Arc::clone(node));
        }
        let mut builder = Node::builder(id)
            .name(record.name.clone())
            .uri(record.uri.clone())
            .available(record.available);
        if let Some(pattern) = &record.include_table {
            builder = builder.include_table(pattern.clone());
        }
        let node = builder.build()?;
        pending.insert(id, Arc::clone(&node));
        Ok(node)
    }

    /// Nodes first seen in `record` become live only once the cluster builds.
    fn build(&mut self, record: &ClusterRecord) -> ClusterResult<Arc<Cluster>> {
        let mut pending = HashMap::new();
        let master = self.node(&mut pending, &record.master)?;
        let slaves = record
            .slaves
            .iter()
            .map(|r| self.node(&mut pending, r))
            .collect::<ClusterResult<Vec<_>>>()?;
        let cluster = Cluster::with_slaves(ClusterId(record.id), record.name.clone(), master, slaves)?;
        self.nodes.extend(pending);
        self.clusters.insert(record.name.clone(), Arc::clone(&cluster));
        Ok(cluster)
    }
}

fn diverges(node: &Node, record: &NodeRecord) -> bool {
    let include = record
        .include_table
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(MATCH_ALL);
    node.name() != record.name
        || node.uri() != record.uri
        || node.is_available() != record.available
        || node.include_table().pattern() != include
}

/// A [`ClusterFactory`] over a [`TopologyStore`].
///
/// Every stored cluster is built when the registry opens. Names that were
/// not stored then are looked up in the store on first use. Nodes are shared:
/// two clusters naming the same node id get the same [`Node`].
///
/// All lookups go through one lock, so concurrent first access to a name
/// builds it once.
pub struct ClusterRegistry<S: TopologyStore> {
    store: S,
    live: Mutex<Option<Live>>,
}

impl<S: TopologyStore> ClusterRegistry<S> {
    /// Opens the registry and builds every stored cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Initialization`] if the store cannot be read
    /// or a stored cluster cannot be built.
    pub fn open(store: S) -> ClusterResult<Self> {
        let records = store
            .load_all()
            .map_err(|e| ClusterError::initialization_caused_by("loading clusters", e))?;

        let mut live = Live::default();
        for record in &records {
            live.build(record).map_err(|e| {
                ClusterError::initialization_caused_by(format!("building cluster {}", record.name), e)
            })?;
        }
        info!(clusters = live.clusters.len(), nodes = live.nodes.len(), "cluster registry opened");

        Ok(Self {
            store,
            live: Mutex::new(Some(live)),
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns true until [`ClusterFactory::close`] is called.
    pub fn is_open(&self) -> bool {
        self.live.lock().is_some()
    }
}

fn closed() -> ClusterError {
    ClusterError::initialization("cluster registry is closed")
}

impl<S: TopologyStore> ClusterFactory for ClusterRegistry<S> {
    fn cluster(&self, name: &str) -> ClusterResult<Arc<Cluster>> {
        if name.trim().is_empty() {
            return Err(ClusterError::InvalidClusterName(name.to_string()));
        }

        let mut guard = self.live.lock();
        let live = guard.as_mut().ok_or_else(closed)?;
        if let Some(cluster) = live.clusters.get(name) {
            return Ok(Arc::clone(cluster));
        }

        debug!(cluster = name, "loading cluster on first use");
        let record = self
            .store
            .load(name)
            .map_err(|e| ClusterError::initialization_caused_by(format!("loading cluster {name}"), e))?
            .ok_or_else(|| ClusterError::initialization(format!("no cluster named {name}")))?;
        let cluster = live
            .build(&record)
            .map_err(|e| ClusterError::initialization_caused_by(format!("building cluster {name}"), e))?;
        info!(cluster = name, id = %cluster.id(), "cluster registered");
        Ok(cluster)
    }

    fn all_clusters(&self) -> ClusterResult<Vec<Arc<Cluster>>> {
        let guard = self.live.lock();
        let live = guard.as_ref().ok_or_else(closed)?;
        Ok(live.clusters.values().cloned().collect())
    }

    fn node(&self, name: &str) -> ClusterResult<Option<Arc<Node>>> {
        let guard = self.live.lock();
        let live = guard.as_ref().ok_or_else(closed)?;
        let mut matches: Vec<&Arc<Node>> = live.nodes.values().filter(|n| n.name() == name).collect();
        matches.sort_by_key(|n| n.id());
        Ok(matches.first().map(|n| Arc::clone(n)))
    }

    fn close(&self) {
        if let Some(live) = self.live.lock().take() {
            info!(clusters = live.clusters.len(), "cluster registry closed");
        }
    }
}

impl<S: TopologyStore> std::fmt::Debug for ClusterRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.live.lock();
        let names: Option<Vec<&String>> = guard.as_ref().map(|l| l.clusters.keys().collect());
        f.debug_struct("ClusterRegistry").field("clusters", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTopologyStore;

    fn record(id: u64, name: &str, master: u64, slaves: &[u64]) -> ClusterRecord {
        let node = |id: u64| NodeRecord {
            id,
            name: format!("db{id}"),
            uri: format!("host=db{id}"),
            include_table: None,
            available: true,
        };
        ClusterRecord {
            id,
            name: name.to_string(),
            master: node(master),
            slaves: slaves.iter().map(|s| node(*s)).collect(),
        }
    }

    fn registry() -> ClusterRegistry<MemoryTopologyStore> {
        let store = MemoryTopologyStore::new();
        store.put(record(1, "east", 1, &[2, 3]));
        store.put(record(2, "west", 2, &[3]));
        ClusterRegistry::open(store).unwrap()
    }

    #[test]
    fn one_instance_per_name() {
        let registry = registry();
        let a = registry.cluster("east").unwrap();
        let b = registry.cluster("east").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.all_clusters().unwrap().len(), 2);
    }

    #[test]
    fn nodes_are_shared_between_clusters() {
        let registry = registry();
        let east = registry.cluster("east").unwrap();
        let west = registry.cluster("west").unwrap();
        let in_east = east.slaves().into_iter().find(|n| n.id() == NodeId(3)).unwrap();
        let in_west = west.slaves().into_iter().find(|n| n.id() == NodeId(3)).unwrap();
        assert!(Arc::ptr_eq(&in_east, &in_west));
        assert!(Arc::ptr_eq(&east.slaves()[0], &west.master()));
        assert_eq!(in_east.clusters().len(), 2);
    }

    #[test]
    fn blank_and_unknown_names() {
        let registry = registry();
        assert!(matches!(
            registry.cluster(""),
            Err(ClusterError::InvalidClusterName(_))
        ));
        assert!(matches!(
            registry.cluster("south"),
            Err(ClusterError::Initialization { .. })
        ));
    }

    #[test]
    fn lazy_load_after_open() {
        let registry = registry();
        registry.store().put(record(3, "north", 4, &[1]));
        let north = registry.cluster("north").unwrap();
        assert_eq!(north.master().id(), NodeId(4));
        let east_master = registry.cluster("east").unwrap().master();
        assert!(Arc::ptr_eq(&north.slaves()[0], &east_master));
    }

    #[test]
    fn lazy_load_failure_is_initialization_error() {
        let registry = registry();
        registry.store().set_failing(true);
        let err = registry.cluster("north").unwrap_err();
        assert!(matches!(err, ClusterError::Initialization { source: Some(_), .. }));
        // already loaded clusters are still served
        assert!(registry.cluster("east").is_ok());
    }

    #[test]
    fn open_failure_is_initialization_error() {
        let store = MemoryTopologyStore::new();
        store.set_failing(true);
        assert!(matches!(
            ClusterRegistry::open(store),
            Err(ClusterError::Initialization { .. })
        ));

        let store = MemoryTopologyStore::new();
        let mut bad = record(1, "east", 1, &[]);
        bad.master.include_table = Some("(".into());
        store.put(bad);
        assert!(matches!(
            ClusterRegistry::open(store),
            Err(ClusterError::Initialization { .. })
        ));
    }

    #[test]
    fn failed_lazy_build_registers_no_nodes() {
        let registry = registry();
        let mut bad = record(3, "north", 7, &[1, 8]);
        bad.slaves[1].include_table = Some("(".into());
        registry.store().put(bad);

        assert!(matches!(
            registry.cluster("north"),
            Err(ClusterError::Initialization { .. })
        ));
        assert!(registry.node("db7").unwrap().is_none());
        assert!(registry.node("db8").unwrap().is_none());
        assert_eq!(registry.cluster("east").unwrap().master().clusters().len(), 1);
    }

    #[test]
    fn live_node_wins_over_diverging_record() {
        let registry = registry();
        let mut north = record(3, "north", 4, &[1]);
        north.slaves[0].uri = "host=elsewhere".into();
        north.slaves[0].include_table = Some("app\\..*".into());
        north.slaves[0].available = false;
        registry.store().put(north);

        let shared = registry.cluster("north").unwrap().slaves()[0].clone();
        assert!(Arc::ptr_eq(&shared, &registry.cluster("east").unwrap().master()));
        assert_eq!(shared.uri(), "host=db1");
        assert_eq!(shared.include_table().pattern(), MATCH_ALL);
        assert!(shared.is_available());
    }

    #[test]
    fn node_lookup_by_name() {
        let registry = registry();
        assert_eq!(registry.node("db3").unwrap().map(|n| n.id()), Some(NodeId(3)));
        assert!(registry.node("db9").unwrap().is_none());
    }

    #[test]
    fn close_ends_lookups() {
        let registry = registry();
        assert!(registry.is_open());
        registry.close();
        assert!(!registry.is_open());
        assert!(matches!(
            registry.cluster("east"),
            Err(ClusterError::Initialization { .. })
        ));
        assert!(registry.all_clusters().is_err());
        assert!(registry.node("db1").is_err());
        registry.close();
    }
}
