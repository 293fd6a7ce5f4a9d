//! ---
//! pvz_section: "04-executors"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Fixed iteration count executor."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use pvz_load_common::config::ExecutorConfig;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::info;

use crate::executor::{
    drain_all, drain_within, spawn_iteration, ExecutorObserver, ExecutorReport, Iteration,
    IterationExecutor, NoopObserver, Tally, WorkerPool,
};
use crate::scheduling::ShutdownSignal;

/// Runs exactly `iterations` iterations with at most `workers` in flight.
pub struct FixedIterations {
    pub iterations: u64,
    pub workers: usize,
    /// Budget for in-flight iterations once shutdown is requested.
    pub graceful_stop: Duration,
    observer: Arc<dyn ExecutorObserver>,
}

impl FixedIterations {
    pub fn new(iterations: u64, workers: usize) -> Self {
        Self {
            iterations,
            workers,
            graceful_stop: Duration::from_secs(30),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            graceful_stop: config.graceful_stop,
            ..Self::new(config.iterations, config.workers)
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutorObserver>) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait]
impl IterationExecutor for FixedIterations {
    fn name(&self) -> &'static str {
        "fixed-iterations"
    }

    async fn execute(
        &self,
        iteration: Arc<dyn Iteration>,
        shutdown: ShutdownSignal,
    ) -> Result<ExecutorReport> {
        let pool = WorkerPool::new(self.workers, self.workers, Arc::clone(&self.observer));
        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();
        let mut started = 0u64;
        let begun = Instant::now();

        info!(iterations = self.iterations, workers = self.workers, "starting fixed iterations executor");
        while started < self.iterations {
            let lease = tokio::select! {
                biased;
                _ = shutdown.triggered() => None,
                lease = pool.checkout() => lease,
            };
            let Some(lease) = lease else { break };
            tally.reap(&mut tasks);
            spawn_iteration(&mut tasks, &iteration, started, lease);
            started += 1;
        }

        let interrupted = tokio::select! {
            _ = drain_all(&mut tasks, &mut tally) => false,
            _ = shutdown.triggered() => true,
        };
        if interrupted {
            drain_within(&mut tasks, &mut tally, self.graceful_stop).await;
        }

        Ok(ExecutorReport {
            executor: self.name().to_owned(),
            started,
            completed: tally.completed,
            failed: tally.failed,
            dropped: 0,
            peak_workers: pool.peak(),
            allocated_workers: pool.allocated(),
            elapsed: begun.elapsed(),
        })
    }
}
