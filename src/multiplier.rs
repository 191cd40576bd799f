//! Self-scaling worker multiplier

use crate::config::{MultiplierConfig, WorkFn};
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::metrics::{MetricsExporter, MetricsTracker, WorkerMetrics};

use crossbeam::channel::{self, Receiver, Sender, select};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Keeps a target number of workers running the same work function
///
/// Every worker invokes the work function exactly once. When it returns or
/// panics the worker exits, and the next maintenance pass launches a
/// replacement. Work that should run continuously loops on its own, for
/// example by receiving from a channel until it is closed.
///
/// # Examples
///
/// ```
/// use esox_multiplier::MultiplierConfig;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let (tx, rx) = crossbeam::channel::bounded::<u32>(16);
/// let total = Arc::new(AtomicUsize::new(0));
/// let sum = Arc::clone(&total);
///
/// let multiplier = MultiplierConfig::new(move || {
///     while let Ok(value) = rx.recv() {
///         sum.fetch_add(value as usize, Ordering::SeqCst);
///     }
/// })
/// .with_worker_count(3)
/// .run();
///
/// for value in 1..=4 {
///     tx.send(value).unwrap();
/// }
/// drop(tx);
///
/// multiplier.stop();
/// assert_eq!(total.load(Ordering::SeqCst), 10);
/// assert_eq!(multiplier.live_workers(), 0);
/// ```
pub struct Multiplier {
    shared: Arc<Shared>,
    multiply_interval: Duration,
}

/// Starts a named worker thread running the given body
type SpawnFn = Arc<dyn Fn(String, Box<dyn FnOnce() + Send>) -> io::Result<()> + Send + Sync>;

struct Shared {
    work: WorkFn,
    spawn: SpawnFn,
    target: AtomicUsize,
    live: AtomicUsize,
    running: AtomicBool,
    maintaining: AtomicBool,
    next_worker_id: AtomicUsize,
    drain_lock: Mutex<()>,
    drained: Condvar,
    control: Mutex<Option<Control>>,
    metrics: MetricsTracker,
}

/// Handles on the maintenance loop, taken exactly once on shutdown
struct Control {
    shutdown: Sender<()>,
    maintenance: JoinHandle<()>,
}

/// Releases a worker's live slot on every exit path
struct WorkerSlot(Arc<Shared>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.release_slot();
    }
}

impl Multiplier {
    /// Shorthand for [`MultiplierConfig::new`]
    pub fn builder<F>(work: F) -> MultiplierConfig
    where
        F: Fn() + Send + Sync + 'static,
    {
        MultiplierConfig::new(work)
    }

    pub(crate) fn start(config: MultiplierConfig) -> PoolResult<Self> {
        Self::start_with(config, Arc::new(spawn_thread))
    }

    fn start_with(config: MultiplierConfig, spawn: SpawnFn) -> PoolResult<Self> {
        let MultiplierConfig {
            work,
            worker_count,
            multiply_interval,
        } = config;

        let shared = Arc::new(Shared {
            work,
            spawn,
            target: AtomicUsize::new(worker_count),
            live: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            maintaining: AtomicBool::new(true),
            next_worker_id: AtomicUsize::new(0),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
            control: Mutex::new(None),
            metrics: MetricsTracker::new(),
        });

        // Ticks before `running` is set skip their pass, so the loop cannot
        // race the initial fill below.
        let (shutdown, shutdown_rx) = channel::bounded(0);
        let loop_shared = Arc::clone(&shared);
        let maintenance = thread::Builder::new()
            .name("multiplier-maintenance".to_string())
            .spawn(move || maintain(loop_shared, multiply_interval, shutdown_rx))
            .map_err(|err| {
                shared.maintaining.store(false, Ordering::SeqCst);
                PoolError::Spawn(err.to_string())
            })?;
        *shared.control.lock() = Some(Control { shutdown, maintenance });

        let launched = shared.top_up();
        shared.running.store(true, Ordering::SeqCst);

        debug!(
            target_workers = worker_count,
            launched,
            interval = ?multiply_interval,
            "Multiplier started"
        );

        Ok(Self {
            shared,
            multiply_interval,
        })
    }

    /// Stop launching workers and block until every running worker has returned
    ///
    /// There is no timeout: a work function that never returns makes this
    /// call block forever. Calling `stop` on a stopped multiplier returns
    /// immediately.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Run [`stop`](Self::stop) on the blocking thread pool
    pub async fn stop_async(&self) -> PoolResult<()> {
        let shared = Arc::clone(&self.shared);

        tokio::task::spawn_blocking(move || shared.stop())
            .await
            .map_err(|_| PoolError::Cancelled)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Workers currently running the work function
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Workers the multiplier keeps alive; zero once stopped
    pub fn target_workers(&self) -> usize {
        self.shared.target.load(Ordering::SeqCst)
    }

    pub fn multiply_interval(&self) -> Duration {
        self.multiply_interval
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let metrics = self.get_metrics();
        HealthStatus::new(
            metrics.live_workers,
            metrics.target_workers,
            metrics.running,
            metrics.launched_total,
            metrics.panicked_total,
        )
    }

    /// Get multiplier metrics
    pub fn get_metrics(&self) -> WorkerMetrics {
        self.shared.metrics.get_metrics(
            self.target_workers(),
            self.live_workers(),
            self.is_running(),
            self.shared.maintaining.load(Ordering::SeqCst),
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl Drop for Multiplier {
    /// Stops topping up without waiting for running workers
    fn drop(&mut self) {
        if self.shared.begin_shutdown() {
            debug!("Multiplier dropped while running, detaching workers");
            drop(self.shared.control.lock().take());
        }
    }
}

impl Shared {
    /// Launch workers until the live count reaches the target
    ///
    /// Returns the number of workers launched.
    fn top_up(self: &Arc<Self>) -> usize {
        let mut launched = 0;

        loop {
            let live = self.live.load(Ordering::SeqCst);
            if live >= self.target.load(Ordering::SeqCst) {
                break;
            }
            // Reserve the slot before spawning
            if self
                .live
                .compare_exchange(live, live + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                continue;
            }

            if let Err(err) = self.launch_worker() {
                warn!(error = %err, "Failed to launch worker, retrying on next pass");
                break;
            }
            launched += 1;
        }

        launched
    }

    /// Spawn one worker for an already reserved slot
    fn launch_worker(self: &Arc<Self>) -> io::Result<()> {
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(self);

        let spawned = (self.spawn)(
            format!("multiplier-worker-{}", worker_id),
            Box::new(move || {
                let slot = WorkerSlot(shared);
                let shared = &slot.0;

                match panic::catch_unwind(AssertUnwindSafe(|| (shared.work)())) {
                    Ok(()) => {
                        shared.metrics.completed_total.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        shared.metrics.panicked_total.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }),
        );

        match spawned {
            Ok(()) => {
                self.metrics.launched_total.fetch_add(1, Ordering::Relaxed);
                trace!(worker_id, "Launched worker");
                Ok(())
            }
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    fn release_slot(&self) {
        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Taking the lock orders this wake-up after a waiter's check
            let _guard = self.drain_lock.lock();
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self) {
        let mut guard = self.drain_lock.lock();
        while self.live.load(Ordering::SeqCst) != 0 {
            self.drained.wait(&mut guard);
        }
    }

    /// Flip `running` off and zero the target; false if already stopped
    fn begin_shutdown(&self) -> bool {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.target.store(0, Ordering::SeqCst);
        true
    }

    fn stop(&self) {
        if !self.begin_shutdown() {
            return;
        }
        debug!(live_workers = self.live.load(Ordering::SeqCst), "Stopping multiplier");

        let control = self.control.lock().take();
        if let Some(Control { shutdown, maintenance }) = control {
            drop(shutdown);
            if maintenance.join().is_err() {
                warn!("Maintenance loop panicked");
            }
        }

        self.wait_drained();
        debug!("Multiplier stopped");
    }
}

/// Re-run top-up on every tick until the shutdown channel disconnects
fn maintain(shared: Arc<Shared>, interval: Duration, shutdown: Receiver<()>) {
    let ticker = channel::tick(interval);

    loop {
        select! {
            recv(ticker) -> _ => {
                if shared.running.load(Ordering::SeqCst) {
                    shared.metrics.maintenance_passes.fetch_add(1, Ordering::Relaxed);
                    let launched = shared.top_up();
                    if launched > 0 {
                        debug!(launched, "Replaced exited workers");
                    }
                }
            }
            recv(shutdown) -> _ => break,
        }
    }

    shared.maintaining.store(false, Ordering::SeqCst);
    trace!("Maintenance loop exited");
}

fn spawn_thread(name: String, body: Box<dyn FnOnce() + Send>) -> io::Result<()> {
    thread::Builder::new().name(name).spawn(body).map(drop)
}
