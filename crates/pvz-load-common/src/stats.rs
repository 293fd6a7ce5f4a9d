//! ---
//! pvz_section: "01-core-functionality"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Latency trend statistics."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{Context, Result};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

/// Upper bound tracked by the histogram: one hour in microseconds.
const MAX_TRACKABLE_MICROS: u64 = 3_600_000_000;

/// Thread-safe latency recorder backed by an HDR histogram (microsecond resolution).
#[derive(Debug)]
pub struct LatencyHistogram {
    samples: Mutex<Histogram<u64>>,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE_MICROS, 3)
            .with_context(|| "failed to create latency histogram")?;
        Ok(Self {
            samples: Mutex::new(histogram),
        })
    }

    pub fn record(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.samples.lock().saturating_record(micros.max(1));
    }

    pub fn len(&self) -> u64 {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at percentile `p` (0-100) in milliseconds; zero when empty.
    pub fn percentile_ms(&self, p: f64) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }
        micros_to_ms(samples.value_at_percentile(p.clamp(0.0, 100.0)))
    }

    pub fn summary(&self) -> TrendSummary {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return TrendSummary::default();
        }
        TrendSummary {
            count: samples.len(),
            avg_ms: samples.mean() / 1000.0,
            min_ms: micros_to_ms(samples.min()),
            med_ms: micros_to_ms(samples.value_at_quantile(0.50)),
            max_ms: micros_to_ms(samples.max()),
            p90_ms: micros_to_ms(samples.value_at_quantile(0.90)),
            p95_ms: micros_to_ms(samples.value_at_quantile(0.95)),
            p99_ms: micros_to_ms(samples.value_at_quantile(0.99)),
        }
    }
}

fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

/// Aggregated view of a latency trend, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub med_ms: f64,
    pub max_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}
