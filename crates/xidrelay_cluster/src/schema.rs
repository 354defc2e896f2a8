//! Live table catalogs.

use crate::error::ClusterResult;
use crate::node::{Node, NodeId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use xidrelay_pg::{PgError, PgSession};

/// Lists the ordinary tables of a node's database.
pub trait SchemaCatalog: Send + Sync {
    /// Returns `(schema, table)` pairs, restricted to `schema` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    fn tables(&self, node: &Node, schema: Option<&str>) -> ClusterResult<Vec<(String, String)>>;
}

const TABLES_SQL: &str = "select table_schema::text, table_name::text \
     from information_schema.tables \
     where table_type = 'BASE TABLE' and ($1::text is null or table_schema = $1) \
     order by 1, 2";

/// Reads `information_schema.tables` over a fresh connection to the node.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgSchemaCatalog;

impl PgSchemaCatalog {
    /// Creates the catalog.
    pub fn new() -> Self {
        Self
    }
}

impl SchemaCatalog for PgSchemaCatalog {
    fn tables(&self, node: &Node, schema: Option<&str>) -> ClusterResult<Vec<(String, String)>> {
        let session = PgSession::connect(&node.uri())?;
        let rows = session.query(TABLES_SQL, &[&schema])?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let schema: String = row.try_get(0).map_err(PgError::from)?;
            let table: String = row.try_get(1).map_err(PgError::from)?;
            out.push((schema, table));
        }
        debug!(node = %node.id(), tables = out.len(), "read table catalog");
        Ok(out)
    }
}

/// A [`SchemaCatalog`] held in memory.
///
/// Every node sees the shared table set unless it has its own.
#[derive(Debug, Default)]
pub struct MemorySchemaCatalog {
    shared: RwLock<BTreeSet<(String, String)>>,
    per_node: RwLock<HashMap<NodeId, BTreeSet<(String, String)>>>,
}

impl MemorySchemaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog whose shared set holds `tables`.
    pub fn with_tables<I, S, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let catalog = Self::new();
        for (schema, table) in tables {
            catalog.add_table(schema, table);
        }
        catalog
    }

    /// Adds a table to the shared set.
    pub fn add_table(&self, schema: impl Into<String>, table: impl Into<String>) {
        self.shared.write().insert((schema.into(), table.into()));
    }

    /// Adds a table visible only to `node`. The first call gives the node
    /// its own set, replacing the shared one.
    pub fn add_node_table(&self, node: NodeId, schema: impl Into<String>, table: impl Into<String>) {
        self.per_node
            .write()
            .entry(node)
            .or_default()
            .insert((schema.into(), table.into()));
    }
}

impl SchemaCatalog for MemorySchemaCatalog {
    fn tables(&self, node: &Node, schema: Option<&str>) -> ClusterResult<Vec<(String, String)>> {
        let per_node = self.per_node.read();
        let shared = self.shared.read();
        let set = per_node.get(&node.id()).unwrap_or(&*shared);
        Ok(set
            .iter()
            .filter(|(s, _)| schema.map_or(true, |want| s == want))
            .cloned()
            .collect())
    }
}
