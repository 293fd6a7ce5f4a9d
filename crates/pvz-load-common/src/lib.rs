//! ---
//! pvz_section: "01-core-functionality"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Shared primitives for the load harness."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
//! Shared primitives for the PVZ load harness workspace: configuration
//! loading, tracing setup, latency statistics, and version metadata.

pub mod config;
pub mod logging;
pub mod stats;
pub mod version;

pub use config::{
    ExecutorConfig, ExecutorKind, LoadTestConfig, LoadedConfig, LoggingConfig, MetricsConfig,
    ReportConfig, Role, ScenarioConfig, TargetConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use stats::{LatencyHistogram, TrendSummary};
pub use version::VersionInfo;
