//! # xidrelay Cluster
//!
//! Replication topology.
//!
//! A [`Cluster`] has one master [`Node`] and a set of slave nodes. Nodes are
//! shared between clusters and carry an include-table pattern that a
//! [`ReplicationStrategy`] evaluates against the node's live table catalog.
//! Membership and availability changes are delivered synchronously to every
//! registered [`ClusterChangeListener`]. A [`ClusterRegistry`] hands out one
//! live cluster per name, built from a [`TopologyStore`].
//!
//! ```rust
//! use std::sync::Arc;
//! use xidrelay_cluster::{Cluster, ClusterEvent, ClusterId, Node, NodeId, RecordingListener};
//!
//! let master = Node::builder(NodeId(1)).name("primary").build().unwrap();
//! let cluster = Cluster::new(ClusterId(1), "east", master).unwrap();
//! let recorder = Arc::new(RecordingListener::new());
//! cluster.add_listener(recorder.clone());
//!
//! let replica = Node::builder(NodeId(2)).name("replica").build().unwrap();
//! assert!(cluster.add_slave(replica.clone()));
//! assert_eq!(recorder.events(), vec![ClusterEvent::SlaveAdded(replica)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cluster;
mod error;
mod listener;
mod node;
mod registry;
mod schema;
mod store;
mod strategy;

pub use cluster::{Cluster, ClusterId};
pub use error::{ClusterError, ClusterResult};
pub use listener::{ClusterChangeListener, ClusterEvent, ListenerHandle, RecordingListener};
pub use node::{IncludeTable, Node, NodeBuilder, NodeId, MATCH_ALL};
pub use registry::{ClusterFactory, ClusterRegistry};
pub use schema::{MemorySchemaCatalog, PgSchemaCatalog, SchemaCatalog};
pub use store::{
    ClusterEntry, ClusterRecord, MemoryTopologyStore, NodeRecord, TopologyDocument, TopologyStore,
};
pub use strategy::{RegexReplicationStrategy, ReplicationStrategy, DEFAULT_IGNORED_SCHEMAS};
