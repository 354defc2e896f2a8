//! Generation rotation and retention.

use crate::catalog::GenerationCatalog;
use crate::config::LogStoreConfig;
use crate::error::{LogStoreError, LogStoreResult};
use crate::generation::LogGeneration;
use tracing::{debug, info, warn};

/// Where a [`LogStore`] is in its rotation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStoreState {
    /// No live generation is known. Initial state.
    NoGeneration,
    /// At least one generation is live.
    HasCurrentGeneration,
    /// A new generation is being created.
    RotatingGeneration,
    /// The oldest generation is being dropped.
    RetiringGeneration,
    /// The last operation failed; the transaction was discarded.
    Failed,
}

impl LogStoreState {
    /// Returns true while a rotation or retirement is in progress.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LogStoreState::RotatingGeneration | LogStoreState::RetiringGeneration
        )
    }
}

/// What one tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The generation created by rotation, if any.
    pub created: Option<LogGeneration>,
    /// The generation dropped by retention, if any.
    pub retired: Option<LogGeneration>,
}

impl TickOutcome {
    /// Returns true if the tick changed nothing.
    pub fn is_idle(&self) -> bool {
        self.created.is_none() && self.retired.is_none()
    }
}

/// Manages the generations of one transaction log and snapshot log pair.
///
/// Only one `LogStore` per pair may run at a time; nothing here prevents two
/// processes from rotating the same catalog.
pub struct LogStore<C: GenerationCatalog> {
    catalog: C,
    config: LogStoreConfig,
    rotate_after: chrono::Duration,
    retain_for: chrono::Duration,
    transaction_view: String,
    snapshot_view: String,
    row_sequence: String,
    state: LogStoreState,
}

impl<C: GenerationCatalog> LogStore<C> {
    /// Creates a log store over `catalog`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(catalog: C, config: LogStoreConfig) -> LogStoreResult<Self> {
        config.validate()?;
        let rotate_after = to_delta(config.rotate_interval)?;
        let retain_for = to_delta(config.retain_interval)?;
        Ok(Self {
            catalog,
            transaction_view: config.transaction_view_name(),
            snapshot_view: config.snapshot_view_name(),
            row_sequence: config.row_sequence_name(),
            config,
            rotate_after,
            retain_for,
            state: LogStoreState::NoGeneration,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// The current state.
    pub fn state(&self) -> LogStoreState {
        self.state
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Live generations, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the catalog failure.
    pub fn generations(&mut self) -> LogStoreResult<Vec<LogGeneration>> {
        let rows = self.catalog.generations()?;
        Ok(rows
            .into_iter()
            .map(|(id, created)| LogGeneration::new(id, created, &self.config))
            .collect())
    }

    /// The newest live generation, which receives new log rows.
    ///
    /// # Errors
    ///
    /// Returns the catalog failure.
    pub fn current_generation(&mut self) -> LogStoreResult<Option<LogGeneration>> {
        Ok(self.generations()?.pop())
    }

    /// Re-reads the catalog and updates [`state`](Self::state).
    ///
    /// # Errors
    ///
    /// Returns the catalog failure.
    pub fn refresh(&mut self) -> LogStoreResult<LogStoreState> {
        let live = self.catalog.generations()?.len();
        self.state = settled(live);
        Ok(self.state)
    }

    /// Creates a new generation if there is none or the newest one is older
    /// than the rotation interval.
    ///
    /// Must run inside a catalog transaction; [`tick`](Self::tick) provides
    /// one.
    ///
    /// # Errors
    ///
    /// Returns the catalog failure and moves to [`LogStoreState::Failed`].
    pub fn maybe_rotate(&mut self) -> LogStoreResult<Option<LogGeneration>> {
        let result = self.rotate_if_due();
        if result.is_err() {
            self.state = LogStoreState::Failed;
        }
        result
    }

    /// Drops the oldest generation if it is older than the retention
    /// interval and is not the only live generation.
    ///
    /// Must run inside a catalog transaction; [`tick`](Self::tick) provides
    /// one.
    ///
    /// # Errors
    ///
    /// Returns the catalog failure and moves to [`LogStoreState::Failed`].
    pub fn maybe_retire(&mut self) -> LogStoreResult<Option<LogGeneration>> {
        let result = self.retire_if_due();
        if result.is_err() {
            self.state = LogStoreState::Failed;
        }
        result
    }

    /// Rotates then retires in one transaction.
    ///
    /// On failure the transaction is rolled back and the error returned.
    ///
    /// # Errors
    ///
    /// Returns the first catalog failure.
    pub fn tick(&mut self) -> LogStoreResult<TickOutcome> {
        self.catalog.begin()?;
        match self.rotate_then_retire() {
            Ok(outcome) => {
                if let Err(e) = self.catalog.commit() {
                    self.state = LogStoreState::Failed;
                    return Err(e);
                }
                Ok(outcome)
            }
            Err(e) => {
                self.state = LogStoreState::Failed;
                if let Err(rollback_err) = self.catalog.rollback() {
                    warn!(error = %rollback_err, "rollback after failed tick also failed");
                }
                Err(e)
            }
        }
    }

    fn rotate_then_retire(&mut self) -> LogStoreResult<TickOutcome> {
        let created = self.maybe_rotate()?;
        let retired = self.maybe_retire()?;
        Ok(TickOutcome { created, retired })
    }

    fn rotate_if_due(&mut self) -> LogStoreResult<Option<LogGeneration>> {
        let mut live = self.generations()?;
        if let Some(newest) = live.last() {
            let now = self.catalog.now()?;
            if !newest.is_older_than(now, self.rotate_after) {
                debug!(generation = newest.id, "not time to rotate yet");
                self.state = LogStoreState::HasCurrentGeneration;
                return Ok(None);
            }
        }

        self.state = LogStoreState::RotatingGeneration;
        let (id, created) = self.catalog.insert_generation()?;
        let generation = LogGeneration::new(id, created, &self.config);

        self.catalog
            .create_transaction_table(&generation.transaction_table, &self.row_sequence)?;
        self.catalog.grant_read(&generation.transaction_table)?;
        self.catalog.create_snapshot_table(&generation.snapshot_table)?;
        self.catalog.grant_read(&generation.snapshot_table)?;

        live.push(generation.clone());
        self.rebuild_views(&live)?;

        info!(
            generation = generation.id,
            transaction_table = %generation.transaction_table,
            snapshot_table = %generation.snapshot_table,
            "created log generation"
        );
        self.state = LogStoreState::HasCurrentGeneration;
        Ok(Some(generation))
    }

    fn retire_if_due(&mut self) -> LogStoreResult<Option<LogGeneration>> {
        let live = self.generations()?;
        if live.len() < 2 {
            debug!(live = live.len(), "keeping the only live generation");
            self.state = settled(live.len());
            return Ok(None);
        }

        let oldest = live[0].clone();
        let now = self.catalog.now()?;
        if !oldest.is_older_than(now, self.retain_for) {
            debug!(generation = oldest.id, "not time to retire yet");
            self.state = LogStoreState::HasCurrentGeneration;
            return Ok(None);
        }

        self.state = LogStoreState::RetiringGeneration;
        self.drop_views()?;
        self.catalog.drop_table(&oldest.transaction_table)?;
        self.catalog.drop_table(&oldest.snapshot_table)?;
        self.catalog.delete_generation(oldest.id)?;
        self.create_views(&live[1..])?;

        info!(
            generation = oldest.id,
            transaction_table = %oldest.transaction_table,
            snapshot_table = %oldest.snapshot_table,
            "retired log generation"
        );
        self.state = LogStoreState::HasCurrentGeneration;
        Ok(Some(oldest))
    }

    fn rebuild_views(&mut self, live: &[LogGeneration]) -> LogStoreResult<()> {
        self.drop_views()?;
        self.create_views(live)
    }

    fn drop_views(&mut self) -> LogStoreResult<()> {
        self.catalog.drop_view_if_exists(&self.transaction_view)?;
        self.catalog.drop_view_if_exists(&self.snapshot_view)
    }

    fn create_views(&mut self, live: &[LogGeneration]) -> LogStoreResult<()> {
        let transaction_tables: Vec<String> =
            live.iter().map(|g| g.transaction_table.clone()).collect();
        let snapshot_tables: Vec<String> = live.iter().map(|g| g.snapshot_table.clone()).collect();

        debug!(view = %self.transaction_view, tables = transaction_tables.len(), "recreating view");
        self.catalog
            .create_union_view(&self.transaction_view, &transaction_tables)?;
        self.catalog.grant_read(&self.transaction_view)?;

        debug!(view = %self.snapshot_view, tables = snapshot_tables.len(), "recreating view");
        self.catalog
            .create_union_view(&self.snapshot_view, &snapshot_tables)?;
        self.catalog.grant_read(&self.snapshot_view)
    }
}

impl<C: GenerationCatalog + std::fmt::Debug> std::fmt::Debug for LogStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("catalog", &self.catalog)
            .field("transaction_view", &self.transaction_view)
            .field("snapshot_view", &self.snapshot_view)
            .field("state", &self.state)
            .finish()
    }
}

fn settled(live: usize) -> LogStoreState {
    if live == 0 {
        LogStoreState::NoGeneration
    } else {
        LogStoreState::HasCurrentGeneration
    }
}

fn to_delta(interval: std::time::Duration) -> LogStoreResult<chrono::Duration> {
    chrono::Duration::from_std(interval)
        .map_err(|_| LogStoreError::invalid_config("interval out of range"))
}
