//! Topology behavior across threads and through the registry.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use xidrelay_cluster::{
    Cluster, ClusterChangeListener, ClusterError, ClusterEvent, ClusterFactory, ClusterId,
    ClusterRegistry, MemorySchemaCatalog, MemoryTopologyStore, Node, NodeId, RecordingListener,
    RegexReplicationStrategy, ReplicationStrategy,
};

fn node(id: u64) -> Arc<Node> {
    Node::builder(NodeId(id)).name(format!("db{id}")).build().unwrap()
}

fn cluster_with_recorder() -> (Arc<Cluster>, Arc<RecordingListener>) {
    let cluster = Cluster::new(ClusterId(1), "east", node(1)).unwrap();
    let recorder = Arc::new(RecordingListener::new());
    cluster.add_listener(recorder.clone());
    (cluster, recorder)
}

#[test]
fn concurrent_adds_notify_once_per_slave() {
    let (cluster, recorder) = cluster_with_recorder();
    let nodes: Vec<Arc<Node>> = (2..66).map(node).collect();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cluster = Arc::clone(&cluster);
            let nodes = nodes.clone();
            thread::spawn(move || {
                // every thread tries every node, starting at a different offset
                let mut added = 0;
                for i in 0..nodes.len() {
                    let n = &nodes[(i + t * 8) % nodes.len()];
                    if cluster.add_slave(Arc::clone(n)) {
                        added += 1;
                    }
                }
                added
            })
        })
        .collect();
    let added: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(added, nodes.len());
    assert_eq!(cluster.slaves().len(), nodes.len());
    let events = recorder.events();
    assert_eq!(events.len(), nodes.len());
    let ids: HashSet<NodeId> = events
        .iter()
        .map(|e| match e {
            ClusterEvent::SlaveAdded(n) => n.id(),
            other => panic!("unexpected event {}", other.kind()),
        })
        .collect();
    assert_eq!(ids.len(), nodes.len());
}

#[test]
fn concurrent_add_and_remove_leave_consistent_state() {
    let (cluster, recorder) = cluster_with_recorder();
    let nodes: Vec<Arc<Node>> = (2..34).map(node).collect();

    let adders: Vec<_> = nodes
        .chunks(8)
        .map(|chunk| {
            let cluster = Arc::clone(&cluster);
            let chunk = chunk.to_vec();
            thread::spawn(move || {
                for n in chunk {
                    cluster.add_slave(Arc::clone(&n));
                    cluster.remove_slave(&n);
                    cluster.add_slave(n);
                }
            })
        })
        .collect();
    for h in adders {
        h.join().unwrap();
    }

    assert_eq!(cluster.slaves().len(), nodes.len());
    let events = recorder.events();
    let added = events.iter().filter(|e| e.kind() == "slave_added").count();
    let removed = events.iter().filter(|e| e.kind() == "slave_removed").count();
    assert_eq!(added, 2 * nodes.len());
    assert_eq!(removed, nodes.len());
    for n in &nodes {
        assert!(cluster.is_slave(n));
        assert_eq!(n.clusters().len(), 1);
    }
}

#[test]
fn racing_add_and_remove_keep_back_reference_in_step() {
    let cluster = Cluster::new(ClusterId(1), "east", node(1)).unwrap();
    for round in 0..2000 {
        let n = node(2);
        let adder = {
            let cluster = Arc::clone(&cluster);
            let n = Arc::clone(&n);
            thread::spawn(move || {
                cluster.add_slave(n);
            })
        };
        let remover = {
            let cluster = Arc::clone(&cluster);
            let n = Arc::clone(&n);
            thread::spawn(move || {
                for _ in 0..64 {
                    if cluster.remove_slave(&n).is_some() {
                        break;
                    }
                    thread::yield_now();
                }
            })
        };
        adder.join().unwrap();
        remover.join().unwrap();

        assert_eq!(
            cluster.is_slave(&n),
            !n.clusters().is_empty(),
            "membership and back-reference disagree in round {round}"
        );
        cluster.remove_slave(&n);
        assert!(n.clusters().is_empty());
    }
}

#[test]
fn removed_slave_availability_reaches_no_listener() {
    let (cluster, recorder) = cluster_with_recorder();
    let n = node(2);
    cluster.add_slave(Arc::clone(&n));
    cluster.remove_slave(&n);
    let before = recorder.events().len();

    n.set_available(false);
    n.set_available(true);
    assert_eq!(recorder.events().len(), before);
}

#[test]
fn listener_sees_mutation_already_applied() {
    struct Checker {
        cluster: std::sync::Mutex<Option<Arc<Cluster>>>,
        seen: std::sync::Mutex<Vec<bool>>,
    }

    impl ClusterChangeListener for Checker {
        fn slave_added(&self, node: &Arc<Node>) {
            if let Some(cluster) = self.cluster.lock().unwrap().as_ref() {
                self.seen.lock().unwrap().push(cluster.is_slave(node));
            }
        }

        fn slave_removed(&self, node: &Arc<Node>) {
            if let Some(cluster) = self.cluster.lock().unwrap().as_ref() {
                self.seen.lock().unwrap().push(!cluster.is_slave(node));
            }
        }
    }

    let cluster = Cluster::new(ClusterId(1), "east", node(1)).unwrap();
    let checker = Arc::new(Checker {
        cluster: std::sync::Mutex::new(Some(Arc::clone(&cluster))),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    cluster.add_listener(checker.clone());

    let replica = node(2);
    cluster.add_slave(Arc::clone(&replica));
    cluster.remove_slave(&replica);
    assert_eq!(*checker.seen.lock().unwrap(), vec![true, true]);

    // break the cycle so the cluster is dropped
    checker.cluster.lock().unwrap().take();
}

#[test]
fn availability_reaches_every_cluster_of_a_node() {
    let shared = node(9);
    let east = Cluster::with_slaves(ClusterId(1), "east", node(1), vec![Arc::clone(&shared)]).unwrap();
    let west = Cluster::with_slaves(ClusterId(2), "west", node(2), vec![Arc::clone(&shared)]).unwrap();
    let east_events = Arc::new(RecordingListener::new());
    let west_events = Arc::new(RecordingListener::new());
    east.add_listener(east_events.clone());
    west.add_listener(west_events.clone());

    shared.set_available(false);
    shared.set_available(false);
    shared.set_available(true);

    let expected = vec![
        ClusterEvent::SlaveDisabled(Arc::clone(&shared)),
        ClusterEvent::SlaveEnabled(Arc::clone(&shared)),
    ];
    assert_eq!(east_events.events(), expected);
    assert_eq!(west_events.events(), expected);

    west.remove_slave(&shared);
    west_events.take();
    shared.set_available(false);
    assert!(west_events.is_empty());
    assert_eq!(east_events.len(), 3);
}

const TOPOLOGY: &str = r#"{
    "nodes": [
        { "id": 1, "name": "primary", "uri": "host=db1" },
        { "id": 2, "name": "replica-a", "uri": "host=db2", "include_table": "regextest\\..*" },
        { "id": 3, "name": "replica-b", "uri": "host=db3" }
    ],
    "clusters": [
        { "id": 1, "name": "east", "master": 1, "slaves": [2, 3] },
        { "id": 2, "name": "west", "master": 3, "slaves": [2] }
    ]
}"#;

#[test]
fn concurrent_first_access_builds_one_cluster() {
    let registry = Arc::new(ClusterRegistry::open(MemoryTopologyStore::new()).unwrap());
    let store_doc = MemoryTopologyStore::from_json(TOPOLOGY).unwrap();
    for name in ["east", "west"] {
        registry.store().put(store_doc_record(&store_doc, name));
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.cluster("east").unwrap())
        })
        .collect();
    let clusters: Vec<Arc<Cluster>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for c in &clusters[1..] {
        assert!(Arc::ptr_eq(&clusters[0], c));
    }
    assert_eq!(registry.all_clusters().unwrap().len(), 1);
}

fn store_doc_record(store: &MemoryTopologyStore, name: &str) -> xidrelay_cluster::ClusterRecord {
    use xidrelay_cluster::TopologyStore;
    store.load(name).unwrap().unwrap()
}

#[test]
fn registry_shares_nodes_and_tears_down() {
    let registry = ClusterRegistry::open(MemoryTopologyStore::from_json(TOPOLOGY).unwrap()).unwrap();
    let east = registry.cluster("east").unwrap();
    let west = registry.cluster("west").unwrap();

    let replica_a = registry.node("replica-a").unwrap().unwrap();
    assert!(east.is_slave(&replica_a));
    assert!(west.is_slave(&replica_a));
    assert_eq!(replica_a.clusters().len(), 2);

    // a change through one cluster is visible through the shared node
    let recorder = Arc::new(RecordingListener::new());
    west.add_listener(recorder.clone());
    replica_a.set_available(false);
    assert_eq!(recorder.events(), vec![ClusterEvent::SlaveDisabled(Arc::clone(&replica_a))]);

    let old = west.replace_master(Arc::clone(&replica_a));
    assert_eq!(old.id(), NodeId(3));
    assert!(Arc::ptr_eq(&west.master(), &replica_a));
    assert!(west.slaves().is_empty());

    registry.close();
    assert!(matches!(
        registry.cluster("east"),
        Err(ClusterError::Initialization { .. })
    ));
}

fn regextest_catalog() -> MemorySchemaCatalog {
    MemorySchemaCatalog::with_tables([
        ("regextest", "orange"),
        ("regextest", "blue"),
        ("regextest", "green"),
        ("regextest", "red"),
        ("regextest_s2", "orange2"),
        ("regextest_s2", "blue2"),
        ("regextest_s2", "green2"),
        ("regextest_s2", "red2"),
        ("pg_catalog", "pg_class"),
        ("bruce", "currentlog"),
    ])
}

#[test]
fn regex_strategy_over_registry_nodes() {
    let registry = ClusterRegistry::open(MemoryTopologyStore::from_json(TOPOLOGY).unwrap()).unwrap();
    let strategy = RegexReplicationStrategy::new(regextest_catalog());
    let replica_a = registry.node("replica-a").unwrap().unwrap();
    let replica_b = registry.node("replica-b").unwrap().unwrap();

    let schema_only = strategy.tables(&replica_a, Some("regextest")).unwrap();
    assert_eq!(
        schema_only,
        vec![
            "regextest.blue",
            "regextest.green",
            "regextest.orange",
            "regextest.red"
        ]
    );
    assert_eq!(strategy.tables(&replica_a, None).unwrap(), schema_only);
    assert!(strategy.tables(&replica_a, Some("regextest_s2")).unwrap().is_empty());

    let everything = strategy.tables(&replica_b, None).unwrap();
    assert_eq!(everything.len(), 8);
    assert!(everything.iter().all(|t| t.starts_with("regextest")));

    replica_b.set_include_table(Some(r"regextest\..*|regextest_s2\.(orange|red)2")).unwrap();
    assert_eq!(strategy.tables(&replica_b, None).unwrap().len(), 6);
    assert_eq!(
        strategy.tables(&replica_b, Some("regextest_s2")).unwrap(),
        vec!["regextest_s2.orange2", "regextest_s2.red2"]
    );
}
