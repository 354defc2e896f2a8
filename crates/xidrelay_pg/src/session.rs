//! Blocking PostgreSQL session.

use crate::error::{PgError, PgResult};
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, warn};

/// A single PostgreSQL connection driven by a private runtime.
///
/// All methods take `&self`; statements from several threads are serialized
/// by the server connection. Transactions are plain `BEGIN`/`COMMIT`
/// statements, so callers sharing one session must coordinate them.
pub struct PgSession {
    runtime: Runtime,
    client: Client,
    url: String,
}

impl PgSession {
    /// Connects to `url` (a libpq style key/value string or a URI).
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or the server refuses
    /// the connection.
    pub fn connect(url: &str) -> PgResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let redacted = redact(url);
        let (client, connection) = runtime
            .block_on(tokio_postgres::connect(url, NoTls))
            .map_err(|source| PgError::Connect {
                url: redacted.clone(),
                source,
            })?;

        let conn_url = redacted.clone();
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                warn!(url = %conn_url, error = %e, "postgres connection closed with error");
            }
        });

        debug!(url = %redacted, "connected to postgres");
        Ok(Self {
            runtime,
            client,
            url: redacted,
        })
    }

    /// The connection string with any password removed.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true once the connection has been lost.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Runs one or more statements without parameters.
    ///
    /// # Errors
    ///
    /// Returns the first statement failure.
    pub fn batch_execute(&self, sql: &str) -> PgResult<()> {
        debug!(sql, "batch execute");
        self.runtime.block_on(self.client.batch_execute(sql))?;
        Ok(())
    }

    /// Runs a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns the statement failure.
    pub fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<u64> {
        debug!(sql, "execute");
        Ok(self.runtime.block_on(self.client.execute(sql, params))?)
    }

    /// Runs a query and returns every row.
    ///
    /// # Errors
    ///
    /// Returns the statement failure.
    pub fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        debug!(sql, "query");
        Ok(self.runtime.block_on(self.client.query(sql, params))?)
    }

    /// Runs a query that must return exactly one row.
    ///
    /// # Errors
    ///
    /// Returns the statement failure, or an error if the row count is not one.
    pub fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Row> {
        debug!(sql, "query one");
        Ok(self.runtime.block_on(self.client.query_one(sql, params))?)
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns the statement failure.
    pub fn begin(&self) -> PgResult<()> {
        self.batch_execute("BEGIN")
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the statement failure.
    pub fn commit(&self) -> PgResult<()> {
        self.batch_execute("COMMIT")
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the statement failure.
    pub fn rollback(&self) -> PgResult<()> {
        self.batch_execute("ROLLBACK")
    }
}

impl std::fmt::Debug for PgSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSession")
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Removes the password from a connection string for logging.
fn redact(url: &str) -> String {
    if let Some((scheme, rest)) = url.split_once("://") {
        if let Some((userinfo, host)) = rest.split_once('@') {
            let user = userinfo.split(':').next().unwrap_or_default();
            return format!("{scheme}://{user}@{host}");
        }
        return url.to_string();
    }
    url.split_whitespace()
        .filter(|kv| !kv.starts_with("password="))
        .collect::<Vec<_>>()
        .join(" ")
}
