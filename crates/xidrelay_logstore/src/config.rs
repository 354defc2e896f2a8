//! Log store configuration.

use crate::error::{LogStoreError, LogStoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use xidrelay_pg::validate_identifier;

/// Default age after which a new generation is created (one day).
pub const DEFAULT_ROTATE_MINUTES: u64 = 1440;
/// Default age after which the oldest generation is dropped (five days).
pub const DEFAULT_RETAIN_MINUTES: u64 = 7200;
/// Default pause between log switch ticks.
pub const DEFAULT_TICK_DELAY_MS: u64 = 60_000;
/// Default catalog table holding one row per live generation.
pub const DEFAULT_CATALOG_TABLE: &str = "bruce.currentlog";
/// Default transaction log view; generation tables are `<view>_<id>`.
pub const DEFAULT_TRANSACTION_VIEW: &str = "bruce.transactionlog";
/// Default snapshot log view; generation tables are `<view>_<id>`.
pub const DEFAULT_SNAPSHOT_VIEW: &str = "bruce.snapshotlog";

/// Configuration for a [`crate::LogStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStoreConfig {
    /// Age of the newest generation after which a new one is created.
    pub rotate_interval: Duration,

    /// Age of the oldest generation after which it is dropped.
    pub retain_interval: Duration,

    /// Pause between worker ticks.
    pub tick_delay: Duration,

    /// Base name of the generation catalog table.
    pub catalog_table: String,

    /// Base name of the transaction log view.
    pub transaction_view: String,

    /// Base name of the snapshot log view.
    pub snapshot_view: String,

    /// Cluster id appended as `_<id>` to every base name, if set.
    pub cluster_id: Option<u64>,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            rotate_interval: Duration::from_secs(DEFAULT_ROTATE_MINUTES * 60),
            retain_interval: Duration::from_secs(DEFAULT_RETAIN_MINUTES * 60),
            tick_delay: Duration::from_millis(DEFAULT_TICK_DELAY_MS),
            catalog_table: DEFAULT_CATALOG_TABLE.to_string(),
            transaction_view: DEFAULT_TRANSACTION_VIEW.to_string(),
            snapshot_view: DEFAULT_SNAPSHOT_VIEW.to_string(),
            cluster_id: None,
        }
    }
}

impl LogStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rotation interval.
    #[must_use]
    pub const fn rotate_interval(mut self, interval: Duration) -> Self {
        self.rotate_interval = interval;
        self
    }

    /// Sets the retention interval.
    #[must_use]
    pub const fn retain_interval(mut self, interval: Duration) -> Self {
        self.retain_interval = interval;
        self
    }

    /// Sets the pause between ticks.
    #[must_use]
    pub const fn tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = delay;
        self
    }

    /// Sets the catalog table base name.
    #[must_use]
    pub fn catalog_table(mut self, name: impl Into<String>) -> Self {
        self.catalog_table = name.into();
        self
    }

    /// Sets the transaction view base name.
    #[must_use]
    pub fn transaction_view(mut self, name: impl Into<String>) -> Self {
        self.transaction_view = name.into();
        self
    }

    /// Sets the snapshot view base name.
    #[must_use]
    pub fn snapshot_view(mut self, name: impl Into<String>) -> Self {
        self.snapshot_view = name.into();
        self
    }

    /// Namespaces every table and view for one cluster.
    #[must_use]
    pub const fn cluster_id(mut self, id: u64) -> Self {
        self.cluster_id = Some(id);
        self
    }

    /// The catalog table name, including any cluster suffix.
    #[must_use]
    pub fn catalog_table_name(&self) -> String {
        self.namespaced(&self.catalog_table)
    }

    /// The transaction log view name, including any cluster suffix.
    #[must_use]
    pub fn transaction_view_name(&self) -> String {
        self.namespaced(&self.transaction_view)
    }

    /// The snapshot log view name, including any cluster suffix.
    #[must_use]
    pub fn snapshot_view_name(&self) -> String {
        self.namespaced(&self.snapshot_view)
    }

    /// The sequence that numbers transaction log rows across generations.
    #[must_use]
    pub fn row_sequence_name(&self) -> String {
        format!("{}_rowseq", self.transaction_view_name())
    }

    /// Checks intervals and every SQL name.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::InvalidConfig`] for a zero interval, or a
    /// [`LogStoreError::Postgres`] identifier error for an unusable name.
    pub fn validate(&self) -> LogStoreResult<()> {
        if self.rotate_interval.is_zero() {
            return Err(LogStoreError::invalid_config("rotate interval must be positive"));
        }
        if self.retain_interval.is_zero() {
            return Err(LogStoreError::invalid_config("retain interval must be positive"));
        }
        if self.tick_delay.is_zero() {
            return Err(LogStoreError::invalid_config("tick delay must be positive"));
        }
        if self.transaction_view == self.snapshot_view {
            return Err(LogStoreError::invalid_config(
                "transaction and snapshot views must differ",
            ));
        }
        for name in [
            self.catalog_table_name(),
            self.transaction_view_name(),
            self.snapshot_view_name(),
        ] {
            validate_identifier(&name)?;
        }
        chrono::Duration::from_std(self.rotate_interval)
            .and(chrono::Duration::from_std(self.retain_interval))
            .map_err(|_| LogStoreError::invalid_config("interval out of range"))?;
        Ok(())
    }

    fn namespaced(&self, base: &str) -> String {
        match self.cluster_id {
            Some(id) => format!("{base}_{id}"),
            None => base.to_string(),
        }
    }
}

/// File form of [`LogStoreConfig`].
///
/// Every field is optional in the file and falls back to the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogStoreSettings {
    /// Rotation interval in minutes.
    pub rotate_minutes: u64,
    /// Retention interval in minutes.
    pub retain_minutes: u64,
    /// Pause between ticks in milliseconds.
    pub tick_delay_ms: u64,
    /// Catalog table base name.
    pub catalog_table: String,
    /// Transaction view base name.
    pub transaction_view: String,
    /// Snapshot view base name.
    pub snapshot_view: String,
    /// Optional cluster namespace.
    pub cluster_id: Option<u64>,
}

impl Default for LogStoreSettings {
    fn default() -> Self {
        Self {
            rotate_minutes: DEFAULT_ROTATE_MINUTES,
            retain_minutes: DEFAULT_RETAIN_MINUTES,
            tick_delay_ms: DEFAULT_TICK_DELAY_MS,
            catalog_table: DEFAULT_CATALOG_TABLE.to_string(),
            transaction_view: DEFAULT_TRANSACTION_VIEW.to_string(),
            snapshot_view: DEFAULT_SNAPSHOT_VIEW.to_string(),
            cluster_id: None,
        }
    }
}

impl LogStoreSettings {
    /// Parses settings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Settings`] for malformed JSON or unknown keys.
    pub fn from_json(text: &str) -> LogStoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> LogStoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Converts to a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn into_config(self) -> LogStoreResult<LogStoreConfig> {
        let config = LogStoreConfig {
            rotate_interval: minutes(self.rotate_minutes)?,
            retain_interval: minutes(self.retain_minutes)?,
            tick_delay: Duration::from_millis(self.tick_delay_ms),
            catalog_table: self.catalog_table,
            transaction_view: self.transaction_view,
            snapshot_view: self.snapshot_view,
            cluster_id: self.cluster_id,
        };
        config.validate()?;
        Ok(config)
    }
}

fn minutes(value: u64) -> LogStoreResult<Duration> {
    value
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| LogStoreError::invalid_config(format!("{value} minutes is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = LogStoreConfig::default();
        assert_eq!(config.rotate_interval, Duration::from_secs(1440 * 60));
        assert_eq!(config.retain_interval, Duration::from_secs(7200 * 60));
        assert_eq!(config.tick_delay, Duration::from_millis(60_000));
        assert_eq!(config.catalog_table_name(), "bruce.currentlog");
        assert_eq!(config.row_sequence_name(), "bruce.transactionlog_rowseq");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = LogStoreConfig::new()
            .rotate_interval(Duration::from_secs(60))
            .retain_interval(Duration::from_secs(300))
            .catalog_table("logs.generations")
            .cluster_id(7);

        assert_eq!(config.rotate_interval, Duration::from_secs(60));
        assert_eq!(config.catalog_table_name(), "logs.generations_7");
        assert_eq!(config.transaction_view_name(), "bruce.transactionlog_7");
        assert_eq!(config.snapshot_view_name(), "bruce.snapshotlog_7");
        assert_eq!(config.row_sequence_name(), "bruce.transactionlog_7_rowseq");
    }

    #[test]
    fn zero_intervals_rejected() {
        let config = LogStoreConfig::new().rotate_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(LogStoreError::InvalidConfig(_))));

        let config = LogStoreConfig::new().retain_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(LogStoreError::InvalidConfig(_))));
    }

    #[test]
    fn unsafe_names_rejected() {
        let config = LogStoreConfig::new().snapshot_view("bruce.snap; drop table x");
        assert!(matches!(config.validate(), Err(LogStoreError::Postgres(_))));
    }

    #[test]
    fn same_view_names_rejected() {
        let config = LogStoreConfig::new().snapshot_view(DEFAULT_TRANSACTION_VIEW);
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_fill_defaults() {
        let settings = LogStoreSettings::from_json(r#"{"rotate_minutes": 10, "cluster_id": 3}"#).unwrap();
        let config = settings.into_config().unwrap();
        assert_eq!(config.rotate_interval, Duration::from_secs(600));
        assert_eq!(config.retain_interval, Duration::from_secs(7200 * 60));
        assert_eq!(config.catalog_table_name(), "bruce.currentlog_3");
    }

    #[test]
    fn settings_reject_unknown_keys() {
        let err = LogStoreSettings::from_json(r#"{"rotate": 10}"#).unwrap_err();
        assert!(matches!(err, LogStoreError::Settings(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"retain_minutes": 0}}"#).unwrap();
        let settings = LogStoreSettings::from_path(file.path()).unwrap();
        assert_eq!(settings.retain_minutes, 0);
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn missing_settings_file() {
        let err = LogStoreSettings::from_path("/nonexistent/xidrelay.json").unwrap_err();
        assert!(matches!(err, LogStoreError::Io(_)));
    }
}
