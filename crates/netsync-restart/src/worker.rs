//! Restart worker: background task that recreates containers one job at
//! a time.
//!
//! Submissions go through a cloneable [`RestartHandle`]. A job is admitted
//! only if no job with the same key is queued or running; the key is
//! released as soon as the recreation finishes, before the settle delay,
//! so a fresh edit arriving during the pause is not lost.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use netsync_core::{DeployableUnit, RestartConfig};

use crate::job::RestartJob;
use crate::runtime::ContainerRuntime;

/// Timing and sizing for the worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause after a successful recreation.
    pub settle_delay: Duration,
    /// Pause before the first job is processed.
    pub startup_delay: Duration,
    /// Maximum queued jobs before `submit` waits.
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            startup_delay: Duration::ZERO,
            queue_capacity: 100,
        }
    }
}

impl WorkerSettings {
    pub fn from_config(config: &RestartConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            startup_delay: config.startup_delay(),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

/// Keys of jobs that are queued or being recreated.
type PendingKeys = Arc<Mutex<HashSet<String>>>;

fn lock(pending: &PendingKeys) -> std::sync::MutexGuard<'_, HashSet<String>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Submission side of the worker.
#[derive(Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<RestartJob>,
    pending: PendingKeys,
}

impl RestartHandle {
    /// Queue a recreation of `units`.
    ///
    /// Returns `false` for an empty set or when an equivalent job is
    /// already queued or running. Waits while the queue is full.
    pub async fn submit(&self, units: Vec<DeployableUnit>) -> bool {
        let Some(job) = RestartJob::new(units) else {
            return false;
        };
        let key = job.key().to_string();

        let admitted = lock(&self.pending).insert(key.clone());
        if !admitted {
            debug!(job = %key, "equivalent restart job already pending");
            return false;
        }

        if self.tx.send(job).await.is_err() {
            warn!(job = %key, "restart worker has stopped, dropping job");
            lock(&self.pending).remove(&key);
            return false;
        }

        info!(job = %key, "restart job queued");
        true
    }

    /// Whether a job with this key is queued or running.
    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains(key)
    }

    /// Sorted keys of every queued or running job.
    pub fn pending(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.pending).iter().cloned().collect();
        keys.sort();
        keys
    }
}

/// The single consumer of the restart queue.
pub struct RestartWorker {
    runtime: Arc<dyn ContainerRuntime>,
    settings: WorkerSettings,
    jobs: mpsc::Receiver<RestartJob>,
    pending: PendingKeys,
}

impl RestartWorker {
    /// Create a worker and the handle used to feed it.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: WorkerSettings,
    ) -> (Self, RestartHandle) {
        let (tx, jobs) = mpsc::channel(settings.queue_capacity.max(1));
        let pending: PendingKeys = Arc::new(Mutex::new(HashSet::new()));
        let worker = Self {
            runtime,
            settings,
            jobs,
            pending: Arc::clone(&pending),
        };
        (worker, RestartHandle { tx, pending })
    }

    /// Process jobs until shutdown is signalled or every handle is dropped.
    ///
    /// Only the waits are cancellable; a recreation in progress runs to
    /// completion.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let startup = self.settings.startup_delay;
        if !startup.is_zero() {
            info!(delay = ?startup, "restart worker starting after delay");
            if !wait_or_shutdown(startup, &mut shutdown).await {
                return;
            }
        }
        info!("restart worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let job = tokio::select! {
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => {
                        debug!("restart queue closed");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            };

            let key = job.key().to_string();
            info!(job = %key, units = job.len(), "recreating containers");

            match self.runtime.recreate(job.units()).await {
                Ok(()) => {
                    lock(&self.pending).remove(&key);
                    let settle = self.settings.settle_delay;
                    info!(job = %key, settle = ?settle, "containers recreated");
                    if !settle.is_zero() && !wait_or_shutdown(settle, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    lock(&self.pending).remove(&key);
                    error!(job = %key, error = %e, "failed to recreate containers");
                }
            }
        }

        info!("restart worker stopped");
    }
}

/// Sleep for `delay`; `false` if shutdown arrived first.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    }
}
