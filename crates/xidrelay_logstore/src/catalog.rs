//! The persistence seam used by the log store.
//!
//! A [`GenerationCatalog`] is everything the rotation logic needs from the
//! master database: a transaction, a clock, the generation catalog table and
//! DDL for tables and views. [`crate::PgGenerationCatalog`] runs it against
//! PostgreSQL; [`crate::MemoryGenerationCatalog`] simulates it for tests.

use crate::error::LogStoreResult;
use chrono::NaiveDateTime;

/// Storage operations for log generations.
///
/// All calls between [`begin`](Self::begin) and [`commit`](Self::commit) form
/// one atomic unit; [`rollback`](Self::rollback) discards them.
pub trait GenerationCatalog: Send {
    /// Opens a transaction.
    fn begin(&mut self) -> LogStoreResult<()>;

    /// Commits the open transaction.
    fn commit(&mut self) -> LogStoreResult<()>;

    /// Discards the open transaction.
    fn rollback(&mut self) -> LogStoreResult<()>;

    /// The database clock, in the time zone of `create_time`.
    fn now(&mut self) -> LogStoreResult<NaiveDateTime>;

    /// Live generations as `(id, create_time)`, ascending by id.
    fn generations(&mut self) -> LogStoreResult<Vec<(i64, NaiveDateTime)>>;

    /// Inserts a catalog row stamped with the current time and returns it.
    fn insert_generation(&mut self) -> LogStoreResult<(i64, NaiveDateTime)>;

    /// Deletes the catalog row for `id`.
    fn delete_generation(&mut self, id: i64) -> LogStoreResult<()>;

    /// Creates a transaction log table whose `rowid` draws from `row_sequence`.
    fn create_transaction_table(&mut self, table: &str, row_sequence: &str) -> LogStoreResult<()>;

    /// Creates a snapshot log table.
    fn create_snapshot_table(&mut self, table: &str) -> LogStoreResult<()>;

    /// Drops a generation table.
    fn drop_table(&mut self, table: &str) -> LogStoreResult<()>;

    /// Drops `view` if it exists.
    fn drop_view_if_exists(&mut self, view: &str) -> LogStoreResult<()>;

    /// Creates `view` as the union of `tables`, in the given order.
    fn create_union_view(&mut self, view: &str, tables: &[String]) -> LogStoreResult<()>;

    /// Grants read access on a table or view to every role.
    ///
    /// Only `select` is granted. The capture triggers insert into the
    /// current generation tables as the calling role, so that role needs its
    /// own insert grant on the log schema.
    fn grant_read(&mut self, relation: &str) -> LogStoreResult<()>;
}

/// DDL for a transaction log generation table.
#[must_use]
pub fn transaction_table_ddl(table: &str, row_sequence: &str) -> String {
    format!(
        "create table {table} (\
         rowid bigint default nextval('{row_sequence}'::regclass), \
         xaction bigint, \
         cmdtype character(1), \
         tabname text, \
         info text, \
         primary key (xaction, rowid))"
    )
}

/// DDL for a snapshot log generation table.
#[must_use]
pub fn snapshot_table_ddl(table: &str) -> String {
    format!(
        "create table {table} (\
         current_xaction bigint primary key, \
         min_xaction bigint not null, \
         max_xaction bigint not null, \
         outstanding_xactions text, \
         update_time timestamp without time zone default now())"
    )
}

/// DDL for a view over every generation table.
#[must_use]
pub fn union_view_ddl(view: &str, tables: &[String]) -> String {
    let selects: Vec<String> = tables.iter().map(|t| format!("select * from {t}")).collect();
    format!("create view {view} as {}", selects.join(" union all "))
}

/// DDL granting `select` on `relation` to every role.
#[must_use]
pub fn grant_read_ddl(relation: &str) -> String {
    format!("grant select on {relation} to public")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_table_keys_on_xaction_and_rowid() {
        let ddl = transaction_table_ddl("bruce.transactionlog_4", "bruce.transactionlog_rowseq");
        assert!(ddl.starts_with("create table bruce.transactionlog_4 ("));
        assert!(ddl.contains("nextval('bruce.transactionlog_rowseq'::regclass)"));
        assert!(ddl.contains("cmdtype character(1)"));
        assert!(ddl.ends_with("primary key (xaction, rowid))"));
    }

    #[test]
    fn snapshot_table_keys_on_current_xaction() {
        let ddl = snapshot_table_ddl("bruce.snapshotlog_4");
        assert!(ddl.contains("current_xaction bigint primary key"));
        assert!(ddl.contains("min_xaction bigint not null"));
        assert!(ddl.contains("update_time timestamp without time zone default now()"));
    }

    #[test]
    fn read_grant_is_select_only() {
        let ddl = grant_read_ddl("bruce.transactionlog_4");
        assert_eq!(ddl, "grant select on bruce.transactionlog_4 to public");
        assert!(!ddl.contains("insert"));
        assert!(!ddl.contains(" all "));
    }

    #[test]
    fn view_unions_in_order() {
        let tables = vec!["bruce.snapshotlog_2".to_string(), "bruce.snapshotlog_5".to_string()];
        assert_eq!(
            union_view_ddl("bruce.snapshotlog", &tables),
            "create view bruce.snapshotlog as select * from bruce.snapshotlog_2 \
             union all select * from bruce.snapshotlog_5"
        );
    }
}
