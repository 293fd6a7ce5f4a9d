//! ---
//! pvz_section: "05-orchestration"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "End-of-run report and console summary."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pvz_load_metrics::{MetricsSnapshot, RateSummary, ThresholdResult};
use pvz_load_rt::ExecutorReport;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: String,
    /// SHA-256 of the effective configuration rendered as TOML.
    pub config_hash: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub executor: ExecutorReport,
    pub metrics: MetricsSnapshot,
    pub thresholds: Vec<ThresholdResult>,
    pub passed: bool,
}

impl RunReport {
    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|result| !result.passed)
    }

    pub fn render_text(&self) -> String {
        self.to_string()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create report directory {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(self).context("failed to serialise run report")?;
        fs::write(path, body)
            .with_context(|| format!("failed to write run report to {}", path.display()))
    }
}

pub fn config_hash(rendered: &str) -> String {
    format!("{:x}", Sha256::digest(rendered.as_bytes()))
}

fn mark(passed: bool) -> &'static str {
    if passed {
        "✓"
    } else {
        "✗"
    }
}

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn rate_line(f: &mut fmt::Formatter<'_>, name: &str, summary: &RateSummary) -> fmt::Result {
    writeln!(
        f,
        "  {:<20} {} ({} of {})",
        name,
        percent(summary.rate()),
        summary.hits,
        summary.total()
    )
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exec = &self.executor;
        writeln!(f, "{} against {}", self.version, self.target)?;
        writeln!(
            f,
            "executor {}: {} started, {} completed, {} failed, {} dropped, peak {} of {} workers, {:.1}s",
            exec.executor,
            exec.started,
            exec.completed,
            exec.failed,
            exec.dropped,
            exec.peak_workers,
            exec.allocated_workers,
            exec.elapsed.as_secs_f64()
        )?;

        if !self.metrics.checks_by_name.is_empty() {
            writeln!(f)?;
            writeln!(f, "checks")?;
            for check in &self.metrics.checks_by_name {
                writeln!(
                    f,
                    "  {} {:<34} {} passed, {} failed",
                    mark(check.fails == 0),
                    check.name,
                    check.passes,
                    check.fails
                )?;
            }
        }

        let trend = &self.metrics.http_req_duration;
        writeln!(f)?;
        writeln!(f, "metrics")?;
        writeln!(
            f,
            "  {:<20} avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
            "http_req_duration",
            trend.avg_ms,
            trend.min_ms,
            trend.med_ms,
            trend.max_ms,
            trend.p90_ms,
            trend.p95_ms
        )?;
        rate_line(f, "http_req_failed", &self.metrics.http_req_failed)?;
        rate_line(f, &self.metrics.error_metric, &self.metrics.step_errors)?;
        rate_line(f, "checks", &self.metrics.checks)?;
        writeln!(f, "  {:<20} {}", "http_reqs", self.metrics.http_reqs)?;
        writeln!(
            f,
            "  {:<20} {} completed, {} failed",
            "iterations", self.metrics.iterations_completed, self.metrics.iterations_failed
        )?;
        writeln!(f, "  {:<20} {}", "dropped_iterations", self.metrics.dropped_iterations)?;

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f, "thresholds")?;
            for result in &self.thresholds {
                writeln!(
                    f,
                    "  {} {} {} (observed {:.4})",
                    mark(result.passed),
                    result.metric,
                    result.expression,
                    result.observed
                )?;
            }
        }

        writeln!(f)?;
        write!(
            f,
            "result: {}",
            if self.passed { "PASSED" } else { "THRESHOLDS CROSSED" }
        )
    }
}
