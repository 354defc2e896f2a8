//! In-memory generation catalog for testing.

use crate::catalog::GenerationCatalog;
use crate::error::{LogStoreError, LogStoreResult};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A catalog operation, used for failure injection and call tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOp {
    /// [`GenerationCatalog::begin`]
    Begin,
    /// [`GenerationCatalog::commit`]
    Commit,
    /// [`GenerationCatalog::rollback`]
    Rollback,
    /// [`GenerationCatalog::now`]
    Now,
    /// [`GenerationCatalog::generations`]
    Generations,
    /// [`GenerationCatalog::insert_generation`]
    InsertGeneration,
    /// [`GenerationCatalog::delete_generation`]
    DeleteGeneration,
    /// Either table creation call.
    CreateTable,
    /// [`GenerationCatalog::drop_table`]
    DropTable,
    /// [`GenerationCatalog::drop_view_if_exists`]
    DropView,
    /// [`GenerationCatalog::create_union_view`]
    CreateView,
    /// [`GenerationCatalog::grant_read`]
    Grant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableKind {
    Transaction { row_sequence: String },
    Snapshot,
}

#[derive(Debug, Clone, Default)]
struct Schema {
    generations: BTreeMap<i64, NaiveDateTime>,
    tables: BTreeMap<String, TableKind>,
    views: BTreeMap<String, Vec<String>>,
    grants: BTreeSet<String>,
}

impl Schema {
    fn relation_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name) || self.views.contains_key(name)
    }
}

#[derive(Debug)]
struct Inner {
    committed: Schema,
    pending: Option<Schema>,
    // Sequences are not transactional, so ids are never reused.
    last_id: i64,
    clock: NaiveDateTime,
    fail_on: Option<CatalogOp>,
    trace: Vec<CatalogOp>,
}

impl Inner {
    fn enter(&mut self, op: CatalogOp) -> LogStoreResult<()> {
        self.trace.push(op);
        if self.fail_on == Some(op) {
            self.fail_on = None;
            return Err(LogStoreError::catalog(format!("injected failure in {op:?}")));
        }
        Ok(())
    }

    fn schema(&mut self) -> &mut Schema {
        match self.pending {
            Some(ref mut pending) => pending,
            None => &mut self.committed,
        }
    }
}

/// A [`GenerationCatalog`] held in memory.
///
/// Behaves like the PostgreSQL catalog where the log store can observe it:
/// statements inside a transaction are invisible to other handles until
/// commit, ids come from a non-transactional sequence, tables referenced by
/// a view cannot be dropped, and relations cannot be created twice.
///
/// Clones share state, so a test can keep a handle for inspection while a
/// worker owns another. Time stands still until [`advance`](Self::advance)
/// is called.
#[derive(Debug, Clone)]
pub struct MemoryGenerationCatalog {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryGenerationCatalog {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self::starting_at(start)
    }
}

impl MemoryGenerationCatalog {
    /// Creates an empty catalog with the clock at 2024-01-01 00:00.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty catalog with the clock at `start`.
    #[must_use]
    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                committed: Schema::default(),
                pending: None,
                last_id: 0,
                clock: start,
                fail_on: None,
                trace: Vec::new(),
            })),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut inner = self.inner.lock();
        inner.clock += by;
    }

    /// Current clock value.
    #[must_use]
    pub fn clock(&self) -> NaiveDateTime {
        self.inner.lock().clock
    }

    /// Makes the next call of `op` fail.
    pub fn fail_next(&self, op: CatalogOp) {
        self.inner.lock().fail_on = Some(op);
    }

    /// Every operation called so far, in order.
    #[must_use]
    pub fn trace(&self) -> Vec<CatalogOp> {
        self.inner.lock().trace.clone()
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// Committed generation ids, ascending.
    #[must_use]
    pub fn generation_ids(&self) -> Vec<i64> {
        self.inner.lock().committed.generations.keys().copied().collect()
    }

    /// Committed table names.
    #[must_use]
    pub fn tables(&self) -> Vec<String> {
        self.inner.lock().committed.tables.keys().cloned().collect()
    }

    /// Tables a committed view selects from, if the view exists.
    #[must_use]
    pub fn view_tables(&self, view: &str) -> Option<Vec<String>> {
        self.inner.lock().committed.views.get(view).cloned()
    }

    /// The row sequence a committed transaction table draws from.
    #[must_use]
    pub fn row_sequence(&self, table: &str) -> Option<String> {
        match self.inner.lock().committed.tables.get(table) {
            Some(TableKind::Transaction { row_sequence }) => Some(row_sequence.clone()),
            _ => None,
        }
    }

    /// Returns true if a committed grant exists on `relation`.
    #[must_use]
    pub fn is_readable(&self, relation: &str) -> bool {
        self.inner.lock().committed.grants.contains(relation)
    }

    fn create_table(&mut self, table: &str, kind: TableKind) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::CreateTable)?;
        let schema = inner.schema();
        if schema.relation_exists(table) {
            return Err(LogStoreError::DuplicateRelation(table.to_string()));
        }
        schema.tables.insert(table.to_string(), kind);
        Ok(())
    }
}

impl GenerationCatalog for MemoryGenerationCatalog {
    fn begin(&mut self) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::Begin)?;
        if inner.pending.is_some() {
            return Err(LogStoreError::catalog("transaction already in progress"));
        }
        inner.pending = Some(inner.committed.clone());
        Ok(())
    }

    fn commit(&mut self) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::Commit)?;
        match inner.pending.take() {
            Some(pending) => {
                inner.committed = pending;
                Ok(())
            }
            None => Err(LogStoreError::catalog("no transaction in progress")),
        }
    }

    fn rollback(&mut self) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::Rollback)?;
        inner.pending = None;
        Ok(())
    }

    fn now(&mut self) -> LogStoreResult<NaiveDateTime> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::Now)?;
        Ok(inner.clock)
    }

    fn generations(&mut self) -> LogStoreResult<Vec<(i64, NaiveDateTime)>> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::Generations)?;
        Ok(inner
            .schema()
            .generations
            .iter()
            .map(|(id, created)| (*id, *created))
            .collect())
    }

    fn insert_generation(&mut self) -> LogStoreResult<(i64, NaiveDateTime)> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::InsertGeneration)?;
        inner.last_id += 1;
        let id = inner.last_id;
        let now = inner.clock;
        inner.schema().generations.insert(id, now);
        Ok((id, now))
    }

    fn delete_generation(&mut self, id: i64) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::DeleteGeneration)?;
        inner.schema().generations.remove(&id);
        Ok(())
    }

    fn create_transaction_table(&mut self, table: &str, row_sequence: &str) -> LogStoreResult<()> {
        self.create_table(
            table,
            TableKind::Transaction {
                row_sequence: row_sequence.to_string(),
            },
        )
    }

    fn create_snapshot_table(&mut self, table: &str) -> LogStoreResult<()> {
        self.create_table(table, TableKind::Snapshot)
    }

    fn drop_table(&mut self, table: &str) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::DropTable)?;
        let schema = inner.schema();
        if let Some((view, _)) = schema
            .views
            .iter()
            .find(|(_, tables)| tables.iter().any(|t| t == table))
        {
            return Err(LogStoreError::TableInUse {
                table: table.to_string(),
                view: view.clone(),
            });
        }
        if schema.tables.remove(table).is_none() {
            return Err(LogStoreError::MissingRelation(table.to_string()));
        }
        schema.grants.remove(table);
        Ok(())
    }

    fn drop_view_if_exists(&mut self, view: &str) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::DropView)?;
        let schema = inner.schema();
        if schema.views.remove(view).is_some() {
            schema.grants.remove(view);
        }
        Ok(())
    }

    fn create_union_view(&mut self, view: &str, tables: &[String]) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::CreateView)?;
        let schema = inner.schema();
        if schema.relation_exists(view) {
            return Err(LogStoreError::DuplicateRelation(view.to_string()));
        }
        if tables.is_empty() {
            return Err(LogStoreError::catalog(format!("view {view} needs at least one table")));
        }
        if let Some(missing) = tables.iter().find(|t| !schema.tables.contains_key(*t)) {
            return Err(LogStoreError::MissingRelation(missing.clone()));
        }
        schema.views.insert(view.to_string(), tables.to_vec());
        Ok(())
    }

    fn grant_read(&mut self, relation: &str) -> LogStoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(CatalogOp::Grant)?;
        let schema = inner.schema();
        if !schema.relation_exists(relation) {
            return Err(LogStoreError::MissingRelation(relation.to_string()));
        }
        schema.grants.insert(relation.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_work_is_invisible() {
        let mut catalog = MemoryGenerationCatalog::new();
        let observer = catalog.clone();

        catalog.begin().unwrap();
        let (id, _) = catalog.insert_generation().unwrap();
        assert_eq!(id, 1);
        assert_eq!(catalog.generations().unwrap().len(), 1);
        assert!(observer.generation_ids().is_empty());

        catalog.commit().unwrap();
        assert_eq!(observer.generation_ids(), vec![1]);
    }

    #[test]
    fn rollback_keeps_sequence_position() {
        let mut catalog = MemoryGenerationCatalog::new();
        catalog.begin().unwrap();
        catalog.insert_generation().unwrap();
        catalog.rollback().unwrap();
        assert!(catalog.generation_ids().is_empty());

        let (id, _) = catalog.insert_generation().unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn tables_in_views_cannot_be_dropped() {
        let mut catalog = MemoryGenerationCatalog::new();
        catalog.create_snapshot_table("s_1").unwrap();
        catalog.create_union_view("s", &["s_1".to_string()]).unwrap();

        let err = catalog.drop_table("s_1").unwrap_err();
        assert!(matches!(err, LogStoreError::TableInUse { .. }));

        catalog.drop_view_if_exists("s").unwrap();
        catalog.drop_view_if_exists("s").unwrap();
        catalog.drop_table("s_1").unwrap();
        assert!(matches!(
            catalog.drop_table("s_1"),
            Err(LogStoreError::MissingRelation(_))
        ));
    }

    #[test]
    fn duplicate_relations_rejected() {
        let mut catalog = MemoryGenerationCatalog::new();
        catalog.create_transaction_table("t_1", "t_rowseq").unwrap();
        assert!(matches!(
            catalog.create_snapshot_table("t_1"),
            Err(LogStoreError::DuplicateRelation(_))
        ));
        assert_eq!(catalog.row_sequence("t_1").as_deref(), Some("t_rowseq"));
    }

    #[test]
    fn views_need_existing_tables() {
        let mut catalog = MemoryGenerationCatalog::new();
        assert!(catalog.create_union_view("v", &[]).is_err());
        assert!(matches!(
            catalog.create_union_view("v", &["nope".to_string()]),
            Err(LogStoreError::MissingRelation(_))
        ));
        assert!(catalog.grant_read("v").is_err());
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut catalog = MemoryGenerationCatalog::new();
        catalog.fail_next(CatalogOp::Now);
        assert!(catalog.now().is_err());
        assert!(catalog.now().is_ok());
        assert_eq!(catalog.trace(), vec![CatalogOp::Now, CatalogOp::Now]);
    }

    #[test]
    fn clock_advances_manually() {
        let mut catalog = MemoryGenerationCatalog::new();
        let start = catalog.now().unwrap();
        catalog.advance(chrono::Duration::minutes(5));
        assert_eq!(catalog.now().unwrap() - start, chrono::Duration::minutes(5));
    }
}
