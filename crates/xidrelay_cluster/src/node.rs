//! Replication nodes.

use crate::cluster::Cluster;
use crate::error::{ClusterError, ClusterResult};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Pattern used when a node has no include-table pattern.
pub const MATCH_ALL: &str = ".*";

/// Globally unique node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compiled include-table pattern together with its source text.
///
/// The pattern must match a whole `schema.table` name. An unset or empty
/// pattern matches every table.
#[derive(Debug, Clone, Default)]
pub struct IncludeTable {
    raw: Option<String>,
    // None when matching everything
    regex: Option<Regex>,
}

impl IncludeTable {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidIncludeTable`] if it does not compile.
    pub fn compile(pattern: Option<&str>) -> ClusterResult<Self> {
        let Some(raw) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(Self::default());
        };
        let regex = Regex::new(&format!("^(?:{raw})$")).map_err(|source| {
            ClusterError::InvalidIncludeTable {
                pattern: raw.to_string(),
                source,
            }
        })?;
        Ok(Self {
            raw: Some(raw.to_string()),
            regex: Some(regex),
        })
    }

    /// The configured pattern, if any.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The pattern in effect.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.raw.as_deref().unwrap_or(MATCH_ALL)
    }

    /// Returns true if `qualified` (a `schema.table` name) is included.
    #[must_use]
    pub fn matches(&self, qualified: &str) -> bool {
        self.regex.as_ref().map_or(true, |r| r.is_match(qualified))
    }
}

/// A database taking part in replication.
///
/// Nodes are shared between clusters through `Arc`. The id never changes;
/// everything else may be updated at runtime.
pub struct Node {
    id: NodeId,
    name: RwLock<String>,
    uri: RwLock<String>,
    include_table: RwLock<IncludeTable>,
    available: Mutex<bool>,
    clusters: RwLock<Vec<Weak<Cluster>>>,
}

impl Node {
    /// Starts building a node.
    pub fn builder(id: NodeId) -> NodeBuilder {
        NodeBuilder::new(id)
    }

    /// The node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Sets the display name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Connection URI.
    pub fn uri(&self) -> String {
        self.uri.read().clone()
    }

    /// Sets the connection URI.
    pub fn set_uri(&self, uri: impl Into<String>) {
        *self.uri.write() = uri.into();
    }

    /// The include-table pattern.
    pub fn include_table(&self) -> IncludeTable {
        self.include_table.read().clone()
    }

    /// Replaces the include-table pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidIncludeTable`] and keeps the old pattern
    /// if `pattern` does not compile.
    pub fn set_include_table(&self, pattern: Option<&str>) -> ClusterResult<()> {
        let compiled = IncludeTable::compile(pattern)?;
        *self.include_table.write() = compiled;
        Ok(())
    }

    /// Returns true if the node replicates `qualified`.
    pub fn includes(&self, qualified: &str) -> bool {
        self.include_table.read().matches(qualified)
    }

    /// Availability flag.
    pub fn is_available(&self) -> bool {
        *self.available.lock()
    }

    /// Sets availability and notifies every owning cluster on change.
    ///
    /// Each cluster's listeners get `slave_enabled` or `slave_disabled` once
    /// per actual change; setting the current value again does nothing.
    pub fn set_available(self: &Arc<Self>, available: bool) {
        {
            let mut current = self.available.lock();
            if *current == available {
                return;
            }
            *current = available;
        }
        debug!(node = %self.id, available, "node availability changed");
        for cluster in self.clusters() {
            cluster.notify_availability(self, available);
        }
    }

    /// Clusters that currently include this node.
    pub fn clusters(&self) -> Vec<Arc<Cluster>> {
        self.clusters.read().iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn attach(&self, cluster: &Arc<Cluster>) {
        let mut clusters = self.clusters.write();
        clusters.retain(|c| c.strong_count() > 0);
        if !clusters.iter().any(|c| c.ptr_eq(&Arc::downgrade(cluster))) {
            clusters.push(Arc::downgrade(cluster));
        }
    }

    pub(crate) fn detach(&self, cluster: &Cluster) {
        self.clusters
            .write()
            .retain(|c| c.upgrade().map_or(false, |c| !std::ptr::eq(Arc::as_ptr(&c), cluster)));
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .field("uri", &*self.uri.read())
            .field("available", &self.is_available())
            .field("include_table", &self.include_table.read().pattern())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name.read(), self.id)
    }
}

/// Builder for [`Node`].
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    id: NodeId,
    name: String,
    uri: String,
    include_table: Option<String>,
    available: bool,
}

impl NodeBuilder {
    /// Creates a builder for an available node that includes every table.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: format!("node-{}", id.0),
            uri: String::new(),
            include_table: None,
            available: true,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the connection URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets the include-table pattern.
    #[must_use]
    pub fn include_table(mut self, pattern: impl Into<String>) -> Self {
        self.include_table = Some(pattern.into());
        self
    }

    /// Sets the initial availability.
    #[must_use]
    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Builds the node.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidIncludeTable`] if the pattern does not
    /// compile.
    pub fn build(self) -> ClusterResult<Arc<Node>> {
        let include_table = IncludeTable::compile(self.include_table.as_deref())?;
        Ok(Arc::new(Node {
            id: self.id,
            name: RwLock::new(self.name),
            uri: RwLock::new(self.uri),
            include_table: RwLock::new(include_table),
            available: Mutex::new(self.available),
            clusters: RwLock::new(Vec::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_matches_everything() {
        for pattern in [None, Some("")] {
            let include = IncludeTable::compile(pattern).unwrap();
            assert_eq!(include.pattern(), MATCH_ALL);
            assert!(include.raw().is_none());
            assert!(include.matches("public.anything"));
        }
    }

    #[test]
    fn pattern_must_match_whole_name() {
        let include = IncludeTable::compile(Some(r"regextest\..*")).unwrap();
        assert!(include.matches("regextest.orange"));
        assert!(!include.matches("regextest_s2.orange2"));
        assert!(!include.matches("xregextest.orange"));

        let include = IncludeTable::compile(Some("public.a|public.b")).unwrap();
        assert!(include.matches("public.a"));
        assert!(include.matches("public.b"));
        assert!(!include.matches("public.ab"));
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = Node::builder(NodeId(1)).include_table("(unclosed").build().unwrap_err();
        assert!(matches!(err, ClusterError::InvalidIncludeTable { .. }));
    }

    #[test]
    fn failed_update_keeps_pattern() {
        let node = Node::builder(NodeId(1)).include_table("public\\..*").build().unwrap();
        assert!(node.set_include_table(Some("[")).is_err());
        assert_eq!(node.include_table().pattern(), "public\\..*");
        node.set_include_table(None).unwrap();
        assert!(node.includes("other.t"));
    }

    #[test]
    fn builder_defaults() {
        let node = Node::builder(NodeId(7)).uri("postgresql://db7/app").build().unwrap();
        assert_eq!(node.id(), NodeId(7));
        assert_eq!(node.name(), "node-7");
        assert_eq!(node.uri(), "postgresql://db7/app");
        assert!(node.is_available());
        assert!(node.clusters().is_empty());
    }

    #[test]
    fn setters() {
        let node = Node::builder(NodeId(2)).available(false).build().unwrap();
        node.set_name("replica-2");
        node.set_uri("host=db2");
        node.set_available(true);
        assert_eq!(node.to_string(), "replica-2 (2)");
        assert_eq!(node.uri(), "host=db2");
        assert!(node.is_available());
    }
}
