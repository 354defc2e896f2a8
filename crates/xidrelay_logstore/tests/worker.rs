//! Log switch worker lifecycle against the in-memory catalog.

use std::thread;
use std::time::{Duration, Instant};
use xidrelay_logstore::{
    CatalogOp, LogStore, LogStoreConfig, LogStoreError, LogSwitchWorker, MemoryGenerationCatalog,
};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn config(tick_delay: Duration) -> LogStoreConfig {
    LogStoreConfig::new()
        .rotate_interval(Duration::from_secs(60))
        .retain_interval(Duration::from_secs(180))
        .tick_delay(tick_delay)
}

#[test]
fn first_tick_runs_immediately() {
    let catalog = MemoryGenerationCatalog::new();
    let store = LogStore::new(catalog.clone(), config(Duration::from_secs(3600))).unwrap();
    let handle = LogSwitchWorker::spawn(store).unwrap();

    assert!(wait_until(Duration::from_secs(5), || handle.ticks() >= 1));
    assert_eq!(catalog.generation_ids(), vec![1]);
    assert!(handle.is_running());

    handle.shutdown();
    handle.join().unwrap();
}

#[test]
fn shutdown_interrupts_long_wait() {
    let store = LogStore::new(MemoryGenerationCatalog::new(), config(Duration::from_secs(3600))).unwrap();
    let handle = LogSwitchWorker::spawn(store).unwrap();
    assert!(wait_until(Duration::from_secs(5), || handle.ticks() >= 1));

    let started = Instant::now();
    handle.shutdown();
    handle.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn wake_forces_early_recheck() {
    let catalog = MemoryGenerationCatalog::new();
    let store = LogStore::new(catalog.clone(), config(Duration::from_secs(3600))).unwrap();
    let handle = LogSwitchWorker::spawn(store).unwrap();
    assert!(wait_until(Duration::from_secs(5), || handle.ticks() >= 1));

    catalog.advance(chrono::Duration::minutes(2));
    handle.wake();

    assert!(wait_until(Duration::from_secs(5), || catalog.generation_ids().len() == 2));
    assert!(handle.is_running());
    drop(handle);
}

#[test]
fn periodic_ticks_rotate_and_retire() {
    let catalog = MemoryGenerationCatalog::new();
    let store = LogStore::new(catalog.clone(), config(Duration::from_millis(10))).unwrap();
    let handle = LogSwitchWorker::spawn(store).unwrap();

    for _ in 0..5 {
        let before = handle.ticks();
        catalog.advance(chrono::Duration::seconds(61));
        assert!(wait_until(Duration::from_secs(5), || handle.ticks() > before + 1));
    }

    handle.shutdown();
    handle.join().unwrap();

    let ids = catalog.generation_ids();
    assert!(ids.len() >= 2, "retention never keeps fewer than two here: {ids:?}");
    assert!(ids.len() <= 4, "old generations were not retired: {ids:?}");
    assert!(!ids.contains(&1));
}

#[test]
fn tick_failure_stops_worker() {
    let catalog = MemoryGenerationCatalog::new();
    let store = LogStore::new(catalog.clone(), config(Duration::from_millis(10))).unwrap();
    let handle = LogSwitchWorker::spawn(store).unwrap();
    assert!(wait_until(Duration::from_secs(5), || handle.ticks() >= 1));

    catalog.fail_next(CatalogOp::Generations);
    assert!(wait_until(Duration::from_secs(5), || !handle.is_running()));

    let err = handle.join().unwrap_err();
    assert!(matches!(err, LogStoreError::Catalog(_)));
    assert!(err.is_fatal());
    assert!(!catalog.in_transaction());
    assert_eq!(catalog.generation_ids(), vec![1]);
}
