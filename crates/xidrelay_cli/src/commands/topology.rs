//! Topology command implementation.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use xidrelay_cluster::{Cluster, ClusterFactory, ClusterRegistry, MemoryTopologyStore, Node};

/// One node as printed.
#[derive(Debug, Serialize)]
pub struct NodeSummary {
    /// Node id.
    pub id: u64,
    /// Node name.
    pub name: String,
    /// Include-table pattern in effect.
    pub include_table: String,
    /// Availability flag.
    pub available: bool,
}

/// One cluster as printed.
#[derive(Debug, Serialize)]
pub struct ClusterSummary {
    /// Cluster id.
    pub id: u64,
    /// Cluster name.
    pub name: String,
    /// The master.
    pub master: NodeSummary,
    /// The slaves.
    pub slaves: Vec<NodeSummary>,
}

impl From<&Arc<Node>> for NodeSummary {
    fn from(node: &Arc<Node>) -> Self {
        Self {
            id: node.id().0,
            name: node.name(),
            include_table: node.include_table().pattern().to_string(),
            available: node.is_available(),
        }
    }
}

impl From<&Arc<Cluster>> for ClusterSummary {
    fn from(cluster: &Arc<Cluster>) -> Self {
        Self {
            id: cluster.id().0,
            name: cluster.name().to_string(),
            master: NodeSummary::from(&cluster.master()),
            slaves: cluster.slaves().iter().map(NodeSummary::from).collect(),
        }
    }
}

/// Runs the topology command.
pub fn run(file: &Path, cluster: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ClusterRegistry::open(MemoryTopologyStore::from_path(file)?)?;
    let summaries = summarize(&registry, cluster)?;
    registry.close();
    print!("{}", render(&summaries, format)?);
    Ok(())
}

fn summarize(
    registry: &dyn ClusterFactory,
    cluster: Option<&str>,
) -> Result<Vec<ClusterSummary>, Box<dyn std::error::Error>> {
    let clusters = match cluster {
        Some(name) => vec![registry.cluster(name)?],
        None => registry.all_clusters()?,
    };
    Ok(clusters.iter().map(ClusterSummary::from).collect())
}

fn render(summaries: &[ClusterSummary], format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        "json" => Ok(format!("{}\n", serde_json::to_string_pretty(summaries)?)),
        "text" => {
            let mut out = String::new();
            for c in summaries {
                writeln!(out, "cluster {} ({})", c.name, c.id)?;
                write_node(&mut out, "master", &c.master)?;
                for s in &c.slaves {
                    write_node(&mut out, "slave ", s)?;
                }
            }
            Ok(out)
        }
        other => Err(format!("unknown format: {other}").into()),
    }
}

fn write_node(out: &mut String, role: &str, node: &NodeSummary) -> std::fmt::Result {
    let state = if node.available { "up" } else { "down" };
    writeln!(
        out,
        "  {role} {} ({}) {state} include={}",
        node.name, node.id, node.include_table
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPOLOGY: &str = r#"{
        "nodes": [
            { "id": 1, "name": "primary" },
            { "id": 2, "name": "replica", "include_table": "app\\..*", "available": false }
        ],
        "clusters": [ { "id": 5, "name": "east", "master": 1, "slaves": [2] } ]
    }"#;

    #[test]
    fn summarizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        std::fs::write(&path, TOPOLOGY).unwrap();

        let registry = ClusterRegistry::open(MemoryTopologyStore::from_path(&path).unwrap()).unwrap();
        let summaries = summarize(&registry, Some("east")).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].slaves[0].include_table, "app\\..*");

        let text = render(&summaries, "text").unwrap();
        assert_eq!(
            text,
            "cluster east (5)\n  master primary (1) up include=.*\n  slave  replica (2) down include=app\\..*\n"
        );
        assert!(summarize(&registry, Some("west")).is_err());
    }
}
