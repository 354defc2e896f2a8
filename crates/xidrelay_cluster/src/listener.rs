//! Topology change notification.

use crate::node::Node;
use parking_lot::Mutex;
use std::sync::Arc;

/// Observer of one cluster's membership and availability changes.
///
/// Callbacks run synchronously on the thread that made the change, after the
/// change is visible through the cluster's accessors. They must not block
/// for long. Every method defaults to doing nothing.
pub trait ClusterChangeListener: Send + Sync {
    /// A slave joined the cluster.
    fn slave_added(&self, _node: &Arc<Node>) {}

    /// A slave left the cluster.
    fn slave_removed(&self, _node: &Arc<Node>) {}

    /// A member became unavailable.
    fn slave_disabled(&self, _node: &Arc<Node>) {}

    /// A member became available again.
    fn slave_enabled(&self, _node: &Arc<Node>) {}

    /// The master was replaced.
    fn master_replaced(&self, _old: &Arc<Node>, _new: &Arc<Node>) {}

    /// The master was reported unreachable.
    fn master_unavailable(&self, _master: &Arc<Node>) {}
}

/// Identifies a registered listener for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(pub(crate) u64);

/// One topology change.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    /// See [`ClusterChangeListener::slave_added`].
    SlaveAdded(Arc<Node>),
    /// See [`ClusterChangeListener::slave_removed`].
    SlaveRemoved(Arc<Node>),
    /// See [`ClusterChangeListener::slave_disabled`].
    SlaveDisabled(Arc<Node>),
    /// See [`ClusterChangeListener::slave_enabled`].
    SlaveEnabled(Arc<Node>),
    /// See [`ClusterChangeListener::master_replaced`].
    MasterReplaced {
        /// The previous master.
        old: Arc<Node>,
        /// The new master.
        new: Arc<Node>,
    },
    /// See [`ClusterChangeListener::master_unavailable`].
    MasterUnavailable(Arc<Node>),
}

impl ClusterEvent {
    /// Calls the matching listener method.
    pub fn dispatch(&self, listener: &dyn ClusterChangeListener) {
        match self {
            ClusterEvent::SlaveAdded(n) => listener.slave_added(n),
            ClusterEvent::SlaveRemoved(n) => listener.slave_removed(n),
            ClusterEvent::SlaveDisabled(n) => listener.slave_disabled(n),
            ClusterEvent::SlaveEnabled(n) => listener.slave_enabled(n),
            ClusterEvent::MasterReplaced { old, new } => listener.master_replaced(old, new),
            ClusterEvent::MasterUnavailable(n) => listener.master_unavailable(n),
        }
    }

    /// Short name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterEvent::SlaveAdded(_) => "slave_added",
            ClusterEvent::SlaveRemoved(_) => "slave_removed",
            ClusterEvent::SlaveDisabled(_) => "slave_disabled",
            ClusterEvent::SlaveEnabled(_) => "slave_enabled",
            ClusterEvent::MasterReplaced { .. } => "master_replaced",
            ClusterEvent::MasterUnavailable(_) => "master_unavailable",
        }
    }
}

/// Events compare by kind and node ids.
impl PartialEq for ClusterEvent {
    fn eq(&self, other: &Self) -> bool {
        use ClusterEvent::*;
        match (self, other) {
            (SlaveAdded(a), SlaveAdded(b))
            | (SlaveRemoved(a), SlaveRemoved(b))
            | (SlaveDisabled(a), SlaveDisabled(b))
            | (SlaveEnabled(a), SlaveEnabled(b))
            | (MasterUnavailable(a), MasterUnavailable(b)) => a.id() == b.id(),
            (MasterReplaced { old: a, new: b }, MasterReplaced { old: c, new: d }) => {
                a.id() == c.id() && b.id() == d.id()
            }
            _ => false,
        }
    }
}

impl Eq for ClusterEvent {}

/// A listener that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ClusterEvent>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    pub fn events(&self) -> Vec<ClusterEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the events received so far.
    pub fn take(&self) -> Vec<ClusterEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of events received so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn record(&self, event: ClusterEvent) {
        self.events.lock().push(event);
    }
}

impl ClusterChangeListener for RecordingListener {
    fn slave_added(&self, node: &Arc<Node>) {
        self.record(ClusterEvent::SlaveAdded(Arc::clone(node)));
    }

    fn slave_removed(&self, node: &Arc<Node>) {
        self.record(ClusterEvent::SlaveRemoved(Arc::clone(node)));
    }

    fn slave_disabled(&self, node: &Arc<Node>) {
        self.record(ClusterEvent::SlaveDisabled(Arc::clone(node)));
    }

    fn slave_enabled(&self, node: &Arc<Node>) {
        self.record(ClusterEvent::SlaveEnabled(Arc::clone(node)));
    }

    fn master_replaced(&self, old: &Arc<Node>, new: &Arc<Node>) {
        self.record(ClusterEvent::MasterReplaced {
            old: Arc::clone(old),
            new: Arc::clone(new),
        });
    }

    fn master_unavailable(&self, master: &Arc<Node>) {
        self.record(ClusterEvent::MasterUnavailable(Arc::clone(master)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn dispatch_reaches_matching_method() {
        let a = Node::builder(NodeId(1)).build().unwrap();
        let b = Node::builder(NodeId(2)).build().unwrap();
        let recorder = RecordingListener::new();

        let events = vec![
            ClusterEvent::SlaveAdded(a.clone()),
            ClusterEvent::SlaveDisabled(a.clone()),
            ClusterEvent::MasterReplaced {
                old: a.clone(),
                new: b.clone(),
            },
            ClusterEvent::MasterUnavailable(b.clone()),
        ];
        for event in &events {
            event.dispatch(&recorder);
        }
        assert_eq!(recorder.events(), events);
        assert_eq!(recorder.take().len(), 4);
        assert!(recorder.is_empty());
    }

    #[test]
    fn events_compare_by_node_id() {
        let a = Node::builder(NodeId(1)).name("a").build().unwrap();
        let a_again = Node::builder(NodeId(1)).name("other").build().unwrap();
        assert_eq!(ClusterEvent::SlaveAdded(a.clone()), ClusterEvent::SlaveAdded(a_again));
        assert_ne!(ClusterEvent::SlaveAdded(a.clone()), ClusterEvent::SlaveRemoved(a));
    }
}
