//! ---
//! pvz_section: "03-metrics-thresholds"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Lock-free rate accumulator."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Fraction of observations that were `true`.
#[derive(Debug, Default)]
pub struct RateCounter {
    hits: AtomicU64,
    total: AtomicU64,
}

impl RateCounter {
    pub fn add(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RateSummary {
        let total = self.total.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed).min(total);
        RateSummary {
            hits,
            misses: total - hits,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateSummary {
    pub hits: u64,
    pub misses: u64,
}

impl RateSummary {
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }

    /// Zero when nothing was observed.
    pub fn rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}
