//! Table selection for replication.

use crate::error::ClusterResult;
use crate::node::Node;
use crate::schema::SchemaCatalog;
use std::collections::BTreeSet;
use tracing::debug;

/// Schemas never replicated by default.
pub const DEFAULT_IGNORED_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast", "bruce"];

/// Decides which tables a node replicates.
pub trait ReplicationStrategy: Send + Sync {
    /// Returns the `schema.table` names `node` replicates, restricted to
    /// `schema` when given. No name appears twice.
    ///
    /// # Errors
    ///
    /// Propagates catalog failures.
    fn tables(&self, node: &Node, schema: Option<&str>) -> ClusterResult<Vec<String>>;
}

/// Selects every table whose qualified name fully matches the node's
/// include-table pattern.
///
/// Tables in ignored schemas are skipped; schema names compare
/// case-insensitively.
#[derive(Debug)]
pub struct RegexReplicationStrategy<C> {
    catalog: C,
    ignored: Vec<String>,
}

impl<C: SchemaCatalog> RegexReplicationStrategy<C> {
    /// Creates a strategy over `catalog` with the default ignored schemas.
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            ignored: DEFAULT_IGNORED_SCHEMAS.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Replaces the ignored schema list.
    #[must_use]
    pub fn with_ignored_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored = schemas.into_iter().map(|s| s.as_ref().to_lowercase()).collect();
        self
    }

    /// The ignored schemas, lower-cased.
    pub fn ignored_schemas(&self) -> &[String] {
        &self.ignored
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn is_ignored(&self, schema: &str) -> bool {
        let schema = schema.to_lowercase();
        self.ignored.iter().any(|s| *s == schema)
    }
}

impl<C: SchemaCatalog> ReplicationStrategy for RegexReplicationStrategy<C> {
    fn tables(&self, node: &Node, schema: Option<&str>) -> ClusterResult<Vec<String>> {
        let include = node.include_table();
        let selected: BTreeSet<String> = self
            .catalog
            .tables(node, schema)?
            .into_iter()
            .filter(|(s, _)| !self.is_ignored(s))
            .map(|(s, t)| format!("{s}.{t}"))
            .filter(|qualified| include.matches(qualified))
            .collect();
        debug!(
            node = %node.id(),
            pattern = include.pattern(),
            schema = schema.unwrap_or("*"),
            tables = selected.len(),
            "resolved replicated tables"
        );
        Ok(selected.into_iter().collect())
    }
}
