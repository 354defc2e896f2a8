//! Logswitch command implementation.

use std::path::Path;
use std::time::Duration;
use tracing::info;
use xidrelay_logstore::{
    LogStore, LogStoreConfig, LogStoreSettings, LogSwitchWorker, PgGenerationCatalog,
};
use xidrelay_pg::PgSession;

/// Command-line values that replace settings file values.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Rotation interval in minutes.
    pub rotate_minutes: Option<u64>,
    /// Retention interval in minutes.
    pub retain_minutes: Option<u64>,
    /// Pause between ticks in milliseconds.
    pub tick_delay_ms: Option<u64>,
    /// Cluster namespace.
    pub cluster_id: Option<u64>,
}

/// Builds the configuration from an optional settings file and overrides.
pub fn load_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<LogStoreConfig, Box<dyn std::error::Error>> {
    let mut settings = match path {
        Some(path) => LogStoreSettings::from_path(path)?,
        None => LogStoreSettings::default(),
    };
    if let Some(v) = overrides.rotate_minutes {
        settings.rotate_minutes = v;
    }
    if let Some(v) = overrides.retain_minutes {
        settings.retain_minutes = v;
    }
    if let Some(v) = overrides.tick_delay_ms {
        settings.tick_delay_ms = v;
    }
    if overrides.cluster_id.is_some() {
        settings.cluster_id = overrides.cluster_id;
    }
    Ok(settings.into_config()?)
}

/// Runs the logswitch command.
pub fn run(
    url: &str,
    config: LogStoreConfig,
    once: bool,
    init: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = PgSession::connect(url)?;
    info!(url = session.url(), "connected to master");

    let mut catalog = PgGenerationCatalog::new(session, &config)?;
    if init {
        catalog.ensure_schema()?;
    }
    let mut store = LogStore::new(catalog, config)?;

    if once {
        let outcome = store.tick()?;
        match (&outcome.created, &outcome.retired) {
            (None, None) => println!("nothing to do"),
            (created, retired) => {
                if let Some(g) = created {
                    println!("created {g}");
                }
                if let Some(g) = retired {
                    println!("retired {g}");
                }
            }
        }
        for g in store.generations()? {
            println!("live {g} since {}", g.created_at);
        }
        return Ok(());
    }

    let handle = LogSwitchWorker::spawn(store)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, stopping log switch worker");
                    handle.shutdown();
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if !handle.is_running() {
                        break;
                    }
                }
            }
        }
    });
    let ticks = handle.ticks();
    handle.join()?;
    info!(ticks, "log switch finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = load_config(None, &Overrides::default()).unwrap();
        assert_eq!(config, LogStoreConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logswitch.json");
        std::fs::write(&path, r#"{"rotate_minutes": 60, "retain_minutes": 180, "cluster_id": 3}"#)
            .unwrap();

        let overrides = Overrides {
            retain_minutes: Some(240),
            tick_delay_ms: Some(1000),
            ..Overrides::default()
        };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.rotate_interval, Duration::from_secs(3600));
        assert_eq!(config.retain_interval, Duration::from_secs(240 * 60));
        assert_eq!(config.tick_delay, Duration::from_millis(1000));
        assert_eq!(config.catalog_table_name(), "bruce.currentlog_3");
    }

    #[test]
    fn invalid_values_rejected() {
        let overrides = Overrides {
            rotate_minutes: Some(0),
            ..Overrides::default()
        };
        assert!(load_config(None, &overrides).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"rotate_minute": 60}"#).unwrap();
        assert!(load_config(Some(&path), &Overrides::default()).is_err());
    }
}
