//! Background log switch thread.

use crate::catalog::GenerationCatalog;
use crate::error::{LogStoreError, LogStoreResult};
use crate::store::LogStore;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct Signal {
    shutdown: AtomicBool,
    running: AtomicBool,
    ticks: AtomicU64,
    wake: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    /// Sleeps up to `delay`. Returns true if woken early.
    fn wait(&self, delay: Duration) -> bool {
        let mut woken = self.wake.lock();
        if !*woken && !self.shutdown.load(Ordering::SeqCst) {
            self.cond.wait_for(&mut woken, delay);
        }
        std::mem::replace(&mut *woken, false)
    }

    fn notify(&self) {
        *self.wake.lock() = true;
        self.cond.notify_all();
    }
}

/// Runs [`LogStore::tick`] on a dedicated thread.
pub struct LogSwitchWorker;

impl LogSwitchWorker {
    /// Starts the worker thread.
    ///
    /// The thread ticks immediately, then after every `tick_delay` from the
    /// store's configuration. The first failed tick is logged and ends the
    /// thread; [`LogSwitchHandle::join`] returns that error.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<C>(store: LogStore<C>) -> LogStoreResult<LogSwitchHandle>
    where
        C: GenerationCatalog + 'static,
    {
        let signal = Arc::new(Signal::default());
        signal.running.store(true, Ordering::SeqCst);
        let thread_signal = Arc::clone(&signal);
        let thread = thread::Builder::new()
            .name("xidrelay-logswitch".into())
            .spawn(move || run(store, &thread_signal))
            .map_err(|e| {
                signal.running.store(false, Ordering::SeqCst);
                LogStoreError::Io(e)
            })?;

        Ok(LogSwitchHandle {
            signal,
            thread: Some(thread),
        })
    }
}

fn run<C: GenerationCatalog>(mut store: LogStore<C>, signal: &Signal) -> LogStoreResult<()> {
    let delay = store.config().tick_delay;
    info!(
        transaction_view = %store.config().transaction_view_name(),
        snapshot_view = %store.config().snapshot_view_name(),
        delay_ms = delay.as_millis() as u64,
        "log switch worker started"
    );

    let result = loop {
        if signal.shutdown.load(Ordering::SeqCst) {
            break Ok(());
        }

        match store.tick() {
            Ok(outcome) => {
                signal.ticks.fetch_add(1, Ordering::SeqCst);
                if outcome.is_idle() {
                    debug!("log switch tick made no changes");
                }
            }
            Err(e) => {
                error!(error = %e, "log switch tick failed, stopping worker");
                break Err(e);
            }
        }

        if signal.wait(delay) && !signal.shutdown.load(Ordering::SeqCst) {
            warn!("log switch wait interrupted, re-checking early");
        }
    };

    signal.running.store(false, Ordering::SeqCst);
    info!("log switch worker stopped");
    result
}

/// Controls a running [`LogSwitchWorker`].
///
/// Dropping the handle shuts the worker down and waits for it.
pub struct LogSwitchHandle {
    signal: Arc<Signal>,
    thread: Option<JoinHandle<LogStoreResult<()>>>,
}

impl LogSwitchHandle {
    /// Asks the worker to stop after its current tick.
    pub fn shutdown(&self) {
        self.signal.shutdown.store(true, Ordering::SeqCst);
        self.signal.notify();
    }

    /// Interrupts the current wait so the worker ticks again now.
    pub fn wake(&self) {
        self.signal.notify();
    }

    /// Returns true until the worker thread has finished its loop.
    pub fn is_running(&self) -> bool {
        self.signal.running.load(Ordering::SeqCst)
    }

    /// Number of ticks that completed successfully.
    pub fn ticks(&self) -> u64 {
        self.signal.ticks.load(Ordering::SeqCst)
    }

    /// Waits for the worker to finish and returns how it ended.
    ///
    /// Does not request shutdown; call [`shutdown`](Self::shutdown) first to
    /// stop a healthy worker.
    ///
    /// # Errors
    ///
    /// Returns the tick failure that stopped the worker, or
    /// [`LogStoreError::WorkerPanicked`].
    pub fn join(mut self) -> LogStoreResult<()> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| LogStoreError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for LogSwitchHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shutdown();
            if thread.join().is_err() {
                warn!("log switch worker panicked during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for LogSwitchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSwitchHandle")
            .field("running", &self.is_running())
            .field("ticks", &self.ticks())
            .finish()
    }
}
