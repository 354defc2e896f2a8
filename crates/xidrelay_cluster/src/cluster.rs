//! Clusters: one master, many slaves, and their listeners.

use crate::error::{ClusterError, ClusterResult};
use crate::listener::{ClusterChangeListener, ClusterEvent, ListenerHandle};
use crate::node::{Node, NodeId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Cluster identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub u64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Members {
    master: Arc<Node>,
    slaves: Vec<Arc<Node>>,
}

impl Members {
    fn contains_slave(&self, id: NodeId) -> bool {
        self.slaves.iter().any(|s| s.id() == id)
    }

    fn contains(&self, id: NodeId) -> bool {
        self.master.id() == id || self.contains_slave(id)
    }
}

/// A named replication cluster.
///
/// A cluster always has exactly one master and a duplicate-free list of
/// slaves in insertion order. Membership changes are atomic with respect to
/// the member list and each node's cluster back-reference, which is updated
/// under the same lock; listeners are called after the lock is released, so a
/// listener may read the cluster but sees any later concurrent change too.
pub struct Cluster {
    id: ClusterId,
    name: String,
    members: RwLock<Members>,
    listeners: RwLock<Vec<(ListenerHandle, Arc<dyn ClusterChangeListener>)>>,
    next_listener: AtomicU64,
    this: Weak<Cluster>,
}

impl Cluster {
    /// Creates a cluster with `master` and no slaves.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidClusterName`] for a blank name.
    pub fn new(id: ClusterId, name: impl Into<String>, master: Arc<Node>) -> ClusterResult<Arc<Self>> {
        Self::with_slaves(id, name, master, Vec::new())
    }

    /// Creates a cluster with `master` and `slaves`.
    ///
    /// Duplicate slaves and a slave equal to the master are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidClusterName`] for a blank name.
    pub fn with_slaves(
        id: ClusterId,
        name: impl Into<String>,
        master: Arc<Node>,
        slaves: Vec<Arc<Node>>,
    ) -> ClusterResult<Arc<Self>> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ClusterError::InvalidClusterName(name));
        }

        let mut members = Members {
            master,
            slaves: Vec::with_capacity(slaves.len()),
        };
        for slave in slaves {
            if !members.contains(slave.id()) {
                members.slaves.push(slave);
            }
        }

        let cluster = Arc::new_cyclic(|this| Self {
            id,
            name,
            members: RwLock::new(members),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            this: this.clone(),
        });

        {
            let members = cluster.members.read();
            members.master.attach(&cluster);
            for slave in &members.slaves {
                slave.attach(&cluster);
            }
        }
        Ok(cluster)
    }

    /// The cluster id.
    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// The cluster name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current master.
    pub fn master(&self) -> Arc<Node> {
        Arc::clone(&self.members.read().master)
    }

    /// The current slaves, in the order they were added.
    pub fn slaves(&self) -> Vec<Arc<Node>> {
        self.members.read().slaves.clone()
    }

    /// Returns true if `node` is the master or a slave.
    pub fn contains(&self, node: &Node) -> bool {
        self.members.read().contains(node.id())
    }

    /// Returns true if `node` is a slave.
    pub fn is_slave(&self, node: &Node) -> bool {
        self.members.read().contains_slave(node.id())
    }

    /// Adds a slave and notifies `slave_added`.
    ///
    /// Returns false, without notifying, if the node is already a slave or
    /// is the master.
    pub fn add_slave(&self, node: Arc<Node>) -> bool {
        {
            let mut members = self.members.write();
            if members.contains(node.id()) {
                warn!(cluster = %self.name, node = %node.id(), "ignoring duplicate slave");
                return false;
            }
            members.slaves.push(Arc::clone(&node));
            self.attach(&node);
        }
        info!(cluster = %self.name, node = %node.id(), "slave added");
        self.deliver(&ClusterEvent::SlaveAdded(node));
        true
    }

    /// Removes a slave and notifies `slave_removed`.
    ///
    /// Returns the removed node, or `None`, without notifying, if `node` was
    /// not a slave.
    pub fn remove_slave(&self, node: &Node) -> Option<Arc<Node>> {
        let removed = {
            let mut members = self.members.write();
            let index = members.slaves.iter().position(|s| s.id() == node.id())?;
            let removed = members.slaves.remove(index);
            removed.detach(self);
            removed
        };
        info!(cluster = %self.name, node = %removed.id(), "slave removed");
        self.deliver(&ClusterEvent::SlaveRemoved(Arc::clone(&removed)));
        Some(removed)
    }

    /// Replaces every slave.
    ///
    /// Listeners see `slave_removed` for each old slave, then `slave_added`
    /// for each new one. The master and duplicates are skipped.
    pub fn set_slaves(&self, slaves: Vec<Arc<Node>>) {
        let (old, new) = {
            let mut members = self.members.write();
            let old = std::mem::take(&mut members.slaves);
            for slave in slaves {
                if !members.contains(slave.id()) {
                    members.slaves.push(slave);
                }
            }
            for node in &old {
                if !members.contains_slave(node.id()) {
                    node.detach(self);
                }
            }
            for node in &members.slaves {
                self.attach(node);
            }
            (old, members.slaves.clone())
        };

        debug!(cluster = %self.name, removed = old.len(), added = new.len(), "slaves replaced");
        for node in old {
            self.deliver(&ClusterEvent::SlaveRemoved(node));
        }
        for node in new {
            self.deliver(&ClusterEvent::SlaveAdded(node));
        }
    }

    /// Makes `node` the master and returns the previous master.
    ///
    /// A slave being promoted leaves the slave list first, notifying
    /// `slave_removed`. Listeners then see `master_replaced(old, new)`.
    /// Replacing the master with itself changes nothing and notifies nobody.
    pub fn replace_master(&self, node: Arc<Node>) -> Arc<Node> {
        let (old, promoted) = {
            let mut members = self.members.write();
            if members.master.id() == node.id() {
                return Arc::clone(&members.master);
            }
            let promoted = match members.slaves.iter().position(|s| s.id() == node.id()) {
                Some(index) => {
                    members.slaves.remove(index);
                    true
                }
                None => false,
            };
            let old = std::mem::replace(&mut members.master, Arc::clone(&node));
            self.attach(&node);
            old.detach(self);
            (old, promoted)
        };

        info!(
            cluster = %self.name,
            old = %old.id(),
            new = %node.id(),
            promoted,
            "master replaced"
        );
        if promoted {
            self.deliver(&ClusterEvent::SlaveRemoved(Arc::clone(&node)));
        }
        self.deliver(&ClusterEvent::MasterReplaced {
            old: Arc::clone(&old),
            new: node,
        });
        old
    }

    /// Tells listeners the master cannot be reached.
    pub fn report_master_unavailable(&self) {
        let master = self.master();
        warn!(cluster = %self.name, node = %master.id(), "master unavailable");
        self.deliver(&ClusterEvent::MasterUnavailable(master));
    }

    /// Registers a listener.
    pub fn add_listener(&self, listener: Arc<dyn ClusterChangeListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((handle, listener));
        handle
    }

    /// Unregisters a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        listeners.len() != before
    }

    /// Registered listeners, in registration order.
    pub fn listeners(&self) -> Vec<Arc<dyn ClusterChangeListener>> {
        self.listeners.read().iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub(crate) fn notify_availability(&self, node: &Arc<Node>, available: bool) {
        if !self.contains(node) {
            return;
        }
        let event = if available {
            ClusterEvent::SlaveEnabled(Arc::clone(node))
        } else {
            ClusterEvent::SlaveDisabled(Arc::clone(node))
        };
        self.deliver(&event);
    }

    fn attach(&self, node: &Node) {
        if let Some(this) = self.this.upgrade() {
            node.attach(&this);
        }
    }

    fn deliver(&self, event: &ClusterEvent) {
        for listener in self.listeners() {
            event.dispatch(listener.as_ref());
        }
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.read();
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("master", &members.master.id())
            .field(
                "slaves",
                &members.slaves.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
