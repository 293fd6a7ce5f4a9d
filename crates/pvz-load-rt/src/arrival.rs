//! ---
//! pvz_section: "04-executors"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Constant arrival-rate executor."
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
use tracing::{info, warn};

use crate::executor::{
    drain_within, spawn_iteration, ExecutorObserver, ExecutorReport, Iteration,
    IterationExecutor, NoopObserver, Tally, WorkerPool,
};
use crate::scheduling::{RateLimiter, ShutdownSignal};

/// Starts `rate` iterations per `time_unit` for `duration`, regardless of
/// how long each iteration takes. Starts that find every worker busy are
/// dropped.
pub struct ConstantArrivalRate {
    pub rate: u64,
    pub time_unit: Duration,
    pub duration: Duration,
    pub pre_allocated_workers: usize,
    pub max_workers: usize,
    pub graceful_stop: Duration,
    observer: Arc<dyn ExecutorObserver>,
}

impl ConstantArrivalRate {
    pub fn new(
        rate: u64,
        time_unit: Duration,
        duration: Duration,
        pre_allocated_workers: usize,
        max_workers: usize,
        graceful_stop: Duration,
    ) -> Self {
        Self {
            rate,
            time_unit,
            duration,
            pre_allocated_workers,
            max_workers,
            graceful_stop,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.rate,
            config.time_unit,
            config.duration,
            config.pre_allocated_workers,
            config.max_workers,
            config.graceful_stop,
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutorObserver>) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait]
impl IterationExecutor for ConstantArrivalRate {
    fn name(&self) -> &'static str {
        "constant-arrival-rate"
    }

    async fn execute(
        &self,
        iteration: Arc<dyn Iteration>,
        shutdown: ShutdownSignal,
    ) -> Result<ExecutorReport> {
        let pool = WorkerPool::new(
            self.pre_allocated_workers,
            self.max_workers,
            Arc::clone(&self.observer),
        );
        let mut limiter = RateLimiter::paced(self.rate, self.time_unit);
        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();
        let mut started = 0u64;
        let mut dropped = 0u64;

        info!(
            rate = self.rate,
            time_unit = ?self.time_unit,
            duration = ?self.duration,
            pre_allocated_workers = self.pre_allocated_workers,
            max_workers = self.max_workers,
            "starting constant arrival rate executor"
        );
        let begun = Instant::now();
        let deadline = tokio::time::sleep_until(begun + self.duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    info!(started, "shutdown requested; no further iterations start");
                    break;
                }
                _ = &mut deadline => break,
                _ = limiter.tick() => {}
            }
            tally.reap(&mut tasks);

            match pool.try_checkout() {
                Some(lease) => {
                    spawn_iteration(&mut tasks, &iteration, started, lease);
                    started += 1;
                }
                None => {
                    if dropped == 0 {
                        warn!(
                            max_workers = self.max_workers,
                            "insufficient workers; dropping iterations"
                        );
                    }
                    dropped += 1;
                    pool.observer().iteration_dropped();
                }
            }
        }

        drain_within(&mut tasks, &mut tally, self.graceful_stop).await;
        let report = ExecutorReport {
            executor: self.name().to_owned(),
            started,
            completed: tally.completed,
            failed: tally.failed,
            dropped,
            peak_workers: pool.peak(),
            allocated_workers: pool.allocated(),
            elapsed: begun.elapsed(),
        };
        info!(
            started = report.started,
            completed = report.completed,
            failed = report.failed,
            dropped = report.dropped,
            "constant arrival rate executor finished"
        );
        Ok(report)
    }
}
