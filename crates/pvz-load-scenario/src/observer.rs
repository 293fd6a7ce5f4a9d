//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Observation hooks fed by the scenario runner."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::time::Duration;

use pvz_load_metrics::RunMetrics;

use crate::model::Step;

/// Receives step-level observations as the runner produces them.
pub trait ScenarioObserver: Send + Sync + 'static {
    /// One HTTP exchange; `status` is `0` when no response arrived.
    fn on_request(&self, step: Step, status: u16, latency: Duration);
    fn on_check(&self, step: Step, check: &'static str, passed: bool);
    /// Error-rate observation, fed for every executed step.
    fn on_step(&self, step: Step, failed: bool);
}

impl ScenarioObserver for RunMetrics {
    fn on_request(&self, step: Step, status: u16, latency: Duration) {
        self.record_request(step.as_str(), status, step.expected_status(), latency);
    }

    fn on_check(&self, _step: Step, check: &'static str, passed: bool) {
        self.record_check(check, passed);
    }

    fn on_step(&self, step: Step, failed: bool) {
        self.record_step_outcome(step.as_str(), failed);
    }
}
