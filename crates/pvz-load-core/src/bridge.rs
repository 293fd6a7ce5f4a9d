//! ---
//! pvz_section: "05-orchestration"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Adapters between the executor, scenario runner, and run metrics."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use pvz_load_metrics::RunMetrics;
use pvz_load_rt::{ExecutorObserver, Iteration};
use pvz_load_scenario::ScenarioRunner;

/// Runs one scenario iteration per executor start and records its outcome.
pub(crate) struct ScenarioIteration {
    pub(crate) runner: Arc<ScenarioRunner>,
    pub(crate) metrics: Arc<RunMetrics>,
}

#[async_trait]
impl Iteration for ScenarioIteration {
    async fn run(&self, iteration: u64) -> bool {
        let mut outcome = OutcomeRecorder::new(&self.metrics);
        let completed = self.runner.run_iteration(iteration).await.is_ok();
        outcome.settle(completed);
        completed
    }
}

/// Records exactly one iteration outcome when dropped. An iteration aborted
/// by the executor, or one that panics, is recorded as failed.
struct OutcomeRecorder<'a> {
    metrics: &'a RunMetrics,
    completed: bool,
}

impl<'a> OutcomeRecorder<'a> {
    fn new(metrics: &'a RunMetrics) -> Self {
        Self {
            metrics,
            completed: false,
        }
    }

    fn settle(&mut self, completed: bool) {
        self.completed = completed;
    }
}

impl Drop for OutcomeRecorder<'_> {
    fn drop(&mut self) {
        self.metrics.record_iteration(self.completed);
    }
}

/// Mirrors worker pool activity into the `vus`, `vus_max`, and
/// `dropped_iterations` series.
pub(crate) struct MetricsExecutorObserver(pub(crate) Arc<RunMetrics>);

impl ExecutorObserver for MetricsExecutorObserver {
    fn workers_changed(&self, active: usize, allocated: usize) {
        self.0.set_active_workers(active);
        self.0.set_allocated_workers(allocated);
    }

    fn iteration_dropped(&self) {
        self.0.record_dropped(1);
    }
}
