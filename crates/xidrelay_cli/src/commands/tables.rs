//! Tables command implementation.

use xidrelay_cluster::{
    Node, NodeId, PgSchemaCatalog, RegexReplicationStrategy, ReplicationStrategy, SchemaCatalog,
};

/// Runs the tables command.
pub fn run(
    url: &str,
    include: Option<&str>,
    schema: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let strategy = RegexReplicationStrategy::new(PgSchemaCatalog::new());
    let tables = resolve(&strategy, url, include, schema)?;
    print!("{}", render(&tables, format)?);
    Ok(())
}

fn resolve<C: SchemaCatalog>(
    strategy: &RegexReplicationStrategy<C>,
    url: &str,
    include: Option<&str>,
    schema: Option<&str>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut builder = Node::builder(NodeId(0)).name("cli").uri(url);
    if let Some(pattern) = include {
        builder = builder.include_table(pattern);
    }
    let node = builder.build()?;
    Ok(strategy.tables(&node, schema)?)
}

fn render(tables: &[String], format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        "json" => Ok(format!("{}\n", serde_json::to_string_pretty(tables)?)),
        "text" => Ok(tables.iter().map(|t| format!("{t}\n")).collect()),
        other => Err(format!("unknown format: {other}").into()),
    }
}
