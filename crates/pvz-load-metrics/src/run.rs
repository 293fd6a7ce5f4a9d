//! ---
//! pvz_section: "03-metrics-thresholds"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Per-run metric series for the load scenario."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use indexmap::IndexMap;
use parking_lot::Mutex;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};
use pvz_load_common::stats::{LatencyHistogram, TrendSummary};
use serde::Serialize;

use crate::rate::{RateCounter, RateSummary};
use crate::SharedRegistry;

pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQS: &str = "http_reqs";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
pub const DROPPED_ITERATIONS: &str = "dropped_iterations";

/// Shape of a named series, which decides the aggregations it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Trend,
    Rate,
    Counter,
}

/// Everything observed during one run. Cheap to share behind an `Arc`; all
/// recording methods take `&self`.
pub struct RunMetrics {
    registry: SharedRegistry,
    error_metric: String,
    http_reqs_total: IntCounterVec,
    http_req_duration_seconds: HistogramVec,
    checks_total: IntCounterVec,
    step_errors_total: IntCounterVec,
    iterations_total: IntCounterVec,
    dropped_iterations_total: IntCounter,
    vus: IntGauge,
    vus_max: IntGauge,
    durations: LatencyHistogram,
    req_failed: RateCounter,
    step_errors: RateCounter,
    checks: RateCounter,
    checks_by_name: Mutex<IndexMap<String, RateSummary>>,
    iterations_completed: AtomicU64,
    iterations_failed: AtomicU64,
    dropped_iterations: AtomicU64,
}

impl RunMetrics {
    /// Register the run metric family against `registry`. `error_metric` names
    /// the per-step error-rate series.
    pub fn new(registry: SharedRegistry, error_metric: impl Into<String>) -> Result<Self> {
        let error_metric = error_metric.into();

        let http_reqs_total = IntCounterVec::new(
            Opts::new(
                "pvz_load_http_reqs_total",
                "HTTP requests issued by the scenario, by step and response status",
            ),
            &["step", "status"],
        )?;
        registry.register(Box::new(http_reqs_total.clone()))?;

        let http_req_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pvz_load_http_req_duration_seconds",
                "Time from sending a scenario request until its response body was read",
            )
            .buckets(prometheus::exponential_buckets(0.001, 2.0, 16)?),
            &["step"],
        )?;
        registry.register(Box::new(http_req_duration_seconds.clone()))?;

        let checks_total = IntCounterVec::new(
            Opts::new("pvz_load_checks_total", "Named response checks by outcome"),
            &["check", "outcome"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let step_errors_total = IntCounterVec::new(
            Opts::new(
                "pvz_load_step_errors_total",
                "Error-rate observations fed once per executed scenario step",
            )
            .const_label("series", error_metric.clone()),
            &["step", "outcome"],
        )?;
        registry.register(Box::new(step_errors_total.clone()))?;

        let iterations_total = IntCounterVec::new(
            Opts::new("pvz_load_iterations_total", "Finished iterations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(iterations_total.clone()))?;

        let dropped_iterations_total = IntCounter::with_opts(Opts::new(
            "pvz_load_dropped_iterations_total",
            "Scheduled iteration starts skipped because every worker was busy",
        ))?;
        registry.register(Box::new(dropped_iterations_total.clone()))?;

        let vus = IntGauge::with_opts(Opts::new(
            "pvz_load_vus",
            "Workers currently executing an iteration",
        ))?;
        registry.register(Box::new(vus.clone()))?;

        let vus_max = IntGauge::with_opts(Opts::new(
            "pvz_load_vus_max",
            "Workers allocated by the executor",
        ))?;
        registry.register(Box::new(vus_max.clone()))?;

        Ok(Self {
            registry,
            error_metric,
            http_reqs_total,
            http_req_duration_seconds,
            checks_total,
            step_errors_total,
            iterations_total,
            dropped_iterations_total,
            vus,
            vus_max,
            durations: LatencyHistogram::new()?,
            req_failed: RateCounter::default(),
            step_errors: RateCounter::default(),
            checks: RateCounter::default(),
            checks_by_name: Mutex::new(IndexMap::new()),
            iterations_completed: AtomicU64::new(0),
            iterations_failed: AtomicU64::new(0),
            dropped_iterations: AtomicU64::new(0),
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn error_metric(&self) -> &str {
        &self.error_metric
    }

    /// Record one HTTP exchange. Status `0` stands for a transport failure.
    pub fn record_request(&self, step: &str, status: u16, expected: u16, latency: Duration) {
        let status_label = status.to_string();
        self.http_reqs_total
            .with_label_values(&[step, status_label.as_str()])
            .inc();
        self.http_req_duration_seconds
            .with_label_values(&[step])
            .observe(latency.as_secs_f64());
        self.durations.record(latency);
        self.req_failed.add(status != expected);
    }

    pub fn record_check(&self, name: &str, passed: bool) {
        self.checks_total
            .with_label_values(&[name, outcome_label(passed)])
            .inc();
        self.checks.add(passed);
        let mut by_name = self.checks_by_name.lock();
        let entry = by_name.entry(name.to_owned()).or_default();
        if passed {
            entry.hits += 1;
        } else {
            entry.misses += 1;
        }
    }

    /// Feed the error-rate series: `failed = true` counts as an error.
    pub fn record_step_outcome(&self, step: &str, failed: bool) {
        self.step_errors_total
            .with_label_values(&[step, if failed { "error" } else { "ok" }])
            .inc();
        self.step_errors.add(failed);
    }

    pub fn record_iteration(&self, completed: bool) {
        let label = if completed { "completed" } else { "failed" };
        self.iterations_total.with_label_values(&[label]).inc();
        if completed {
            self.iterations_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.iterations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped_iterations_total.inc_by(count);
        self.dropped_iterations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_active_workers(&self, active: usize) {
        self.vus.set(active as i64);
    }

    pub fn set_allocated_workers(&self, allocated: usize) {
        self.vus_max.set(allocated as i64);
    }

    /// Kind of the named series, or `None` when the run does not record it.
    pub fn kind_of(&self, metric: &str) -> Option<MetricKind> {
        match metric {
            HTTP_REQ_DURATION => Some(MetricKind::Trend),
            HTTP_REQ_FAILED | CHECKS => Some(MetricKind::Rate),
            HTTP_REQS | ITERATIONS | DROPPED_ITERATIONS => Some(MetricKind::Counter),
            other if other == self.error_metric => Some(MetricKind::Rate),
            _ => None,
        }
    }

    /// Latency trend used for percentile thresholds.
    pub fn durations(&self) -> &LatencyHistogram {
        &self.durations
    }

    pub fn rate(&self, metric: &str) -> Option<RateSummary> {
        match metric {
            HTTP_REQ_FAILED => Some(self.req_failed.summary()),
            CHECKS => Some(self.checks.summary()),
            other if other == self.error_metric => Some(self.step_errors.summary()),
            _ => None,
        }
    }

    pub fn count(&self, metric: &str) -> Option<u64> {
        match metric {
            HTTP_REQS => Some(self.req_failed.summary().total()),
            ITERATIONS => Some(
                self.iterations_completed.load(Ordering::Relaxed)
                    + self.iterations_failed.load(Ordering::Relaxed),
            ),
            DROPPED_ITERATIONS => Some(self.dropped_iterations.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let checks_by_name = self
            .checks_by_name
            .lock()
            .iter()
            .map(|(name, summary)| CheckSummary {
                name: name.clone(),
                passes: summary.hits,
                fails: summary.misses,
            })
            .collect();
        MetricsSnapshot {
            http_reqs: self.req_failed.summary().total(),
            http_req_duration: self.durations.summary(),
            http_req_failed: self.req_failed.summary(),
            error_metric: self.error_metric.clone(),
            step_errors: self.step_errors.summary(),
            checks: self.checks.summary(),
            checks_by_name,
            iterations_completed: self.iterations_completed.load(Ordering::Relaxed),
            iterations_failed: self.iterations_failed.load(Ordering::Relaxed),
            dropped_iterations: self.dropped_iterations.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunMetrics")
            .field("error_metric", &self.error_metric)
            .finish_non_exhaustive()
    }
}

fn outcome_label(passed: bool) -> &'static str {
    if passed {
        "pass"
    } else {
        "fail"
    }
}

/// Point-in-time copy of the aggregated series.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub http_reqs: u64,
    pub http_req_duration: TrendSummary,
    pub http_req_failed: RateSummary,
    pub error_metric: String,
    pub step_errors: RateSummary,
    pub checks: RateSummary,
    pub checks_by_name: Vec<CheckSummary>,
    pub iterations_completed: u64,
    pub iterations_failed: u64,
    pub dropped_iterations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}
