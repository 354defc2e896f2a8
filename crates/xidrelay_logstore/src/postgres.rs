//! PostgreSQL generation catalog.

use crate::catalog::{
    grant_read_ddl, snapshot_table_ddl, transaction_table_ddl, union_view_ddl, GenerationCatalog,
};
use crate::config::LogStoreConfig;
use crate::error::LogStoreResult;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use tracing::info;
use xidrelay_pg::{split_qualified, PgError, PgSession};

/// A [`GenerationCatalog`] backed by the master database.
#[derive(Debug)]
pub struct PgGenerationCatalog {
    session: PgSession,
    catalog_table: String,
    row_sequence: String,
    schemas: BTreeSet<String>,
}

impl PgGenerationCatalog {
    /// Uses `session` for the catalog named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(session: PgSession, config: &LogStoreConfig) -> LogStoreResult<Self> {
        config.validate()?;
        let schemas = [
            config.catalog_table_name(),
            config.transaction_view_name(),
            config.snapshot_view_name(),
        ]
        .iter()
        .filter_map(|name| split_qualified(name).0.map(str::to_string))
        .collect();
        Ok(Self {
            session,
            catalog_table: config.catalog_table_name(),
            row_sequence: config.row_sequence_name(),
            schemas,
        })
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &PgSession {
        &self.session
    }

    /// Creates the log schema, catalog table and row sequence if missing.
    ///
    /// This is enough for a fresh master to run the log switcher; capture
    /// triggers are installed separately.
    ///
    /// # Errors
    ///
    /// Returns the first statement failure.
    pub fn ensure_schema(&mut self) -> LogStoreResult<()> {
        let mut statements: Vec<String> = self
            .schemas
            .iter()
            .map(|schema| format!("create schema if not exists {schema}"))
            .collect();
        statements.push(format!(
            "create table if not exists {} (\
             id bigserial primary key, \
             create_time timestamp without time zone not null default now())",
            self.catalog_table
        ));
        statements.push(format!("create sequence if not exists {}", self.row_sequence));

        self.session.batch_execute(&statements.join(";\n"))?;
        info!(catalog = %self.catalog_table, sequence = %self.row_sequence, "log schema ready");
        Ok(())
    }

    fn view_exists(&self, view: &str) -> LogStoreResult<bool> {
        let (schema, name) = split_qualified(view);
        let schema = schema.unwrap_or("public");
        let rows = self.session.query(
            "select 1 from pg_views where schemaname = $1 and viewname = $2",
            &[&schema, &name],
        )?;
        Ok(!rows.is_empty())
    }
}

impl GenerationCatalog for PgGenerationCatalog {
    fn begin(&mut self) -> LogStoreResult<()> {
        Ok(self.session.begin()?)
    }

    fn commit(&mut self) -> LogStoreResult<()> {
        Ok(self.session.commit()?)
    }

    fn rollback(&mut self) -> LogStoreResult<()> {
        Ok(self.session.rollback()?)
    }

    fn now(&mut self) -> LogStoreResult<NaiveDateTime> {
        let row = self.session.query_one("select now()::timestamp", &[])?;
        Ok(row.try_get(0).map_err(PgError::from)?)
    }

    fn generations(&mut self) -> LogStoreResult<Vec<(i64, NaiveDateTime)>> {
        let sql = format!("select id, create_time from {} order by id", self.catalog_table);
        let rows = self.session.query(&sql, &[])?;
        rows.iter()
            .map(|row| -> LogStoreResult<(i64, NaiveDateTime)> {
                let id: i64 = row.try_get(0).map_err(PgError::from)?;
                let created: NaiveDateTime = row.try_get(1).map_err(PgError::from)?;
                Ok((id, created))
            })
            .collect()
    }

    fn insert_generation(&mut self) -> LogStoreResult<(i64, NaiveDateTime)> {
        let sql = format!(
            "insert into {} (create_time) values (now()) returning id, create_time",
            self.catalog_table
        );
        let row = self.session.query_one(&sql, &[])?;
        let id: i64 = row.try_get(0).map_err(PgError::from)?;
        let created: NaiveDateTime = row.try_get(1).map_err(PgError::from)?;
        Ok((id, created))
    }

    fn delete_generation(&mut self, id: i64) -> LogStoreResult<()> {
        let sql = format!("delete from {} where id = $1", self.catalog_table);
        self.session.execute(&sql, &[&id])?;
        Ok(())
    }

    fn create_transaction_table(&mut self, table: &str, row_sequence: &str) -> LogStoreResult<()> {
        Ok(self
            .session
            .batch_execute(&transaction_table_ddl(table, row_sequence))?)
    }

    fn create_snapshot_table(&mut self, table: &str) -> LogStoreResult<()> {
        Ok(self.session.batch_execute(&snapshot_table_ddl(table))?)
    }

    fn drop_table(&mut self, table: &str) -> LogStoreResult<()> {
        Ok(self.session.batch_execute(&format!("drop table {table}"))?)
    }

    fn drop_view_if_exists(&mut self, view: &str) -> LogStoreResult<()> {
        if self.view_exists(view)? {
            self.session.batch_execute(&format!("drop view {view}"))?;
        }
        Ok(())
    }

    fn create_union_view(&mut self, view: &str, tables: &[String]) -> LogStoreResult<()> {
        Ok(self.session.batch_execute(&union_view_ddl(view, tables))?)
    }

    fn grant_read(&mut self, relation: &str) -> LogStoreResult<()> {
        Ok(self.session.batch_execute(&grant_read_ddl(relation))?)
    }
}
