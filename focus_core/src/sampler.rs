//! Background sensor sampling.
//!
//! A `Sampler` owns one worker thread per `start()`/`stop()` bracket. The
//! worker opens nothing itself: `start()` opens the hardware reader on the
//! caller's thread (so open failures surface as errors) and moves it into
//! the worker, which drops it on exit. Every good reading updates the
//! latest value and the rolling window under a single lock.
//!
//! Safety: the worker is stopped and joined (bounded) on `stop()` and when
//! the `Sampler` is dropped, preventing thread leaks.
use crossbeam_channel as xch;
use focus_traits::clock::Clock;
use focus_traits::{BoxError, PositionSensor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::config::SamplerCfg;
use crate::window::RollingWindow;

/// One open acquisition handle (bus, camera).
pub trait SampleReader {
    /// Take one reading. Errors are treated as transient by the sampler.
    fn read(&mut self) -> Result<f64, BoxError>;
}

/// Factory for readers; called once per `start()`.
pub trait SampleSource {
    type Reader: SampleReader + Send + 'static;

    fn open(&self) -> Result<Self::Reader, BoxError>;
}

impl<F: FnMut() -> Result<f64, BoxError>> SampleReader for F {
    fn read(&mut self) -> Result<f64, BoxError> {
        self()
    }
}

#[derive(Debug)]
struct SignalCell {
    latest: f64,
    window: RollingWindow,
}

#[derive(Debug)]
struct Shared {
    cell: Mutex<SignalCell>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SignalCell> {
        // A panicking reader cannot leave the cell half-written: every
        // update is two plain stores, so the poisoned value is still valid.
        self.cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

struct Worker {
    shutdown: Arc<AtomicBool>,
    done_rx: xch::Receiver<()>,
    join_handle: JoinHandle<()>,
}

pub struct Sampler<S: SampleSource> {
    source: S,
    cfg: SamplerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl<S: SampleSource> Sampler<S> {
    pub fn new(source: S, cfg: SamplerCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let shared = Arc::new(Shared {
            cell: Mutex::new(SignalCell {
                latest: 0.0,
                window: RollingWindow::new(cfg.window),
            }),
        });
        Self {
            source,
            cfg,
            clock,
            shared,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of samples currently held in the rolling window.
    pub fn window_len(&self) -> usize {
        self.shared.lock().window.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

fn run_worker<R: SampleReader>(
    mut reader: R,
    cfg: SamplerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
) {
    let mut failures: u64 = 0;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::debug!("Sampler thread received shutdown signal");
            break;
        }

        match reader.read() {
            Ok(v) => {
                let mut cell = shared.lock();
                cell.latest = v;
                cell.window.push(v);
                drop(cell);
                if failures > 0 {
                    tracing::debug!(failures, "sensor recovered");
                    failures = 0;
                }
            }
            Err(e) => {
                failures += 1;
                // Log the first failure of a streak only.
                if failures == 1 {
                    tracing::warn!(error = %e, "sensor read failed; keeping last value");
                }
                if !cfg.backoff.is_zero() {
                    clock.sleep(cfg.backoff);
                }
            }
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        clock.sleep(cfg.idle);
    }
    drop(reader);
    tracing::trace!("Sampler thread exiting cleanly");
}

impl<S: SampleSource> PositionSensor for Sampler<S> {
    fn start(&mut self) -> Result<(), BoxError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let reader = self.source.open()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = xch::bounded::<()>(1);

        let cfg = self.cfg;
        let clock = Arc::clone(&self.clock);
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&shutdown);
        let join_handle = std::thread::Builder::new()
            .name("focus-sampler".into())
            .spawn(move || {
                run_worker(reader, cfg, clock, shared, flag);
                let _ = done_tx.send(());
            })?;

        tracing::debug!(window = self.cfg.window, "sampler started");
        self.worker = Some(Worker {
            shutdown,
            done_rx,
            join_handle,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.shutdown.store(true, Ordering::Relaxed);

        // A read blocked in the driver can outlive the timeout; the thread
        // is then left to finish on its own and releases its handle on exit.
        match worker.done_rx.recv_timeout(self.cfg.join_timeout) {
            Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                match worker.join_handle.join() {
                    Ok(()) => tracing::trace!("Sampler thread joined successfully"),
                    Err(e) => tracing::warn!(?e, "Sampler thread panicked during shutdown"),
                }
            }
            Err(xch::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = self.cfg.join_timeout.as_millis() as u64,
                    "sampler did not stop in time; detaching"
                );
            }
        }
    }

    fn get_value(&self) -> f64 {
        self.shared.lock().latest
    }

    fn get_value_mean(&self) -> f64 {
        self.shared.lock().window.mean()
    }

    fn set_window_size(&self, n: usize) {
        self.shared.lock().window.resize(n);
    }
}

impl<S: SampleSource> Drop for Sampler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
