//! ---
//! pvz_section: "04-executors"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Executor abstraction and shared worker bookkeeping."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::scheduling::ShutdownSignal;

/// One unit of scheduled work. Returns `true` when the iteration completed.
#[async_trait]
pub trait Iteration: Send + Sync + 'static {
    async fn run(&self, iteration: u64) -> bool;
}

/// Live notifications from an executor's worker pool.
pub trait ExecutorObserver: Send + Sync + 'static {
    fn workers_changed(&self, _active: usize, _allocated: usize) {}
    fn iteration_dropped(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutorObserver for NoopObserver {}

/// Injected scheduling strategy.
#[async_trait]
pub trait IterationExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        iteration: Arc<dyn Iteration>,
        shutdown: ShutdownSignal,
    ) -> Result<ExecutorReport>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorReport {
    pub executor: String,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub peak_workers: usize,
    pub allocated_workers: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Bounded pool of worker slots. Allocation grows on demand up to `max`.
pub(crate) struct WorkerPool {
    permits: Arc<Semaphore>,
    max: usize,
    allocated: AtomicUsize,
    peak: AtomicUsize,
    observer: Arc<dyn ExecutorObserver>,
}

impl WorkerPool {
    pub(crate) fn new(pre_allocated: usize, max: usize, observer: Arc<dyn ExecutorObserver>) -> Arc<Self> {
        let max = max.max(1);
        let allocated = pre_allocated.min(max);
        observer.workers_changed(0, allocated);
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
            allocated: AtomicUsize::new(allocated),
            peak: AtomicUsize::new(0),
            observer,
        })
    }

    pub(crate) fn active(&self) -> usize {
        self.max - self.permits.available_permits()
    }

    pub(crate) fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    pub(crate) fn observer(&self) -> &dyn ExecutorObserver {
        self.observer.as_ref()
    }

    /// Claims a free worker without waiting.
    pub(crate) fn try_checkout(self: &Arc<Self>) -> Option<WorkerLease> {
        let permit = self.permits.clone().try_acquire_owned().ok()?;
        Some(self.lease(permit))
    }

    /// Waits for a free worker.
    pub(crate) async fn checkout(self: &Arc<Self>) -> Option<WorkerLease> {
        let permit = self.permits.clone().acquire_owned().await.ok()?;
        Some(self.lease(permit))
    }

    fn lease(self: &Arc<Self>, permit: OwnedSemaphorePermit) -> WorkerLease {
        let active = self.active();
        self.peak.fetch_max(active, Ordering::Relaxed);
        let previous = self.allocated.fetch_max(active, Ordering::Relaxed);
        if active > previous {
            info!(allocated = active, max = self.max, "worker pool grew");
        }
        self.observer.workers_changed(active, self.allocated());
        WorkerLease {
            _permit: permit,
            pool: Arc::clone(self),
        }
    }
}

/// Held by a running iteration; frees its worker slot on drop.
pub(crate) struct WorkerLease {
    _permit: OwnedSemaphorePermit,
    pool: Arc<WorkerPool>,
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        // The permit is released after this body runs.
        let active = self.pool.active().saturating_sub(1);
        self.pool.observer.workers_changed(active, self.pool.allocated());
    }
}

/// Outcome counters for joined iteration tasks.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub(crate) completed: u64,
    pub(crate) failed: u64,
}

impl Tally {
    pub(crate) fn record(&mut self, joined: Result<bool, JoinError>) {
        match joined {
            Ok(true) => self.completed += 1,
            Ok(false) => self.failed += 1,
            Err(err) if err.is_cancelled() => self.failed += 1,
            Err(err) => {
                error!(error = %err, "iteration task panicked");
                self.failed += 1;
            }
        }
    }

    pub(crate) fn reap(&mut self, tasks: &mut JoinSet<bool>) {
        while let Some(joined) = tasks.try_join_next() {
            self.record(joined);
        }
    }
}

pub(crate) fn spawn_iteration(
    tasks: &mut JoinSet<bool>,
    iteration: &Arc<dyn Iteration>,
    id: u64,
    lease: WorkerLease,
) {
    let iteration = Arc::clone(iteration);
    tasks.spawn(async move {
        let completed = iteration.run(id).await;
        drop(lease);
        completed
    });
}

/// Waits for every in-flight iteration.
pub(crate) async fn drain_all(tasks: &mut JoinSet<bool>, tally: &mut Tally) {
    while let Some(joined) = tasks.join_next().await {
        tally.record(joined);
    }
}

/// Waits up to `budget` for in-flight iterations, then aborts the rest.
pub(crate) async fn drain_within(tasks: &mut JoinSet<bool>, tally: &mut Tally, budget: Duration) {
    if tokio::time::timeout(budget, drain_all(tasks, tally)).await.is_ok() {
        return;
    }
    warn!(
        stragglers = tasks.len(),
        graceful_stop = ?budget,
        "graceful stop elapsed; aborting in-flight iterations"
    );
    tasks.abort_all();
    drain_all(tasks, tally).await;
}
