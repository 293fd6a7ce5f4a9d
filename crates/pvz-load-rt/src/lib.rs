//! ---
//! pvz_section: "04-executors"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Iteration scheduling for the load harness."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
//! Executors decide when iterations start; the iterations themselves are
//! opaque to them.

use std::sync::Arc;

use pvz_load_common::config::{ExecutorConfig, ExecutorKind};

pub mod arrival;
pub mod executor;
pub mod fixed;
pub mod scheduling;

pub use arrival::ConstantArrivalRate;
pub use executor::{ExecutorObserver, ExecutorReport, Iteration, IterationExecutor, NoopObserver};
pub use fixed::FixedIterations;
pub use scheduling::{shutdown_channel, RateLimiter, ShutdownSignal, ShutdownTrigger};

/// Builds the executor selected by `config.kind`.
pub fn build_executor(
    config: &ExecutorConfig,
    observer: Arc<dyn ExecutorObserver>,
) -> Box<dyn IterationExecutor> {
    match config.kind {
        ExecutorKind::ConstantArrivalRate => {
            Box::new(ConstantArrivalRate::from_config(config).with_observer(observer))
        }
        ExecutorKind::FixedIterations => {
            Box::new(FixedIterations::from_config(config).with_observer(observer))
        }
    }
}
