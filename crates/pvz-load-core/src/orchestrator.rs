//! ---
//! pvz_section: "05-orchestration"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Primary load-test orchestration."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use pvz_load_common::config::LoadTestConfig;
use pvz_load_common::version::VersionInfo;
use pvz_load_metrics::{new_registry, spawn_http_server, RunMetrics, SharedRegistry, ThresholdSet};
use pvz_load_rt::{build_executor, IterationExecutor, ShutdownSignal};
use pvz_load_scenario::{HttpTransport, ReqwestTransport, ScenarioRunner};
use tracing::{info, warn};

use crate::bridge::{MetricsExecutorObserver, ScenarioIteration};
use crate::report::{config_hash, RunReport};

/// Owns everything one load-test run needs.
pub struct LoadTestOrchestrator {
    config: Arc<LoadTestConfig>,
    registry: SharedRegistry,
    metrics: Arc<RunMetrics>,
    thresholds: ThresholdSet,
    runner: Arc<ScenarioRunner>,
    executor: Box<dyn IterationExecutor>,
    version: VersionInfo,
}

impl LoadTestOrchestrator {
    /// Build a run against `config.target` over HTTP.
    pub fn new(config: LoadTestConfig) -> Result<Self> {
        config.validate()?;
        let transport =
            ReqwestTransport::new(&config.target.base_url, config.target.request_timeout)
                .context("failed to construct http client")?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a run over a caller-supplied transport.
    pub fn with_transport(config: LoadTestConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        let registry = new_registry();
        let metrics = Arc::new(
            RunMetrics::new(registry.clone(), config.scenario.error_metric.clone())
                .context("failed to register run metrics")?,
        );
        let thresholds = ThresholdSet::for_run(&config.thresholds, &metrics)
            .context("invalid threshold configuration")?;
        let runner = Arc::new(ScenarioRunner::new(
            transport,
            metrics.clone(),
            config.scenario.clone(),
        ));
        let executor = build_executor(
            &config.executor,
            Arc::new(MetricsExecutorObserver(metrics.clone())),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            metrics,
            thresholds,
            runner,
            executor,
            version: VersionInfo::current(),
        })
    }

    /// Replace the executor chosen by configuration.
    pub fn with_executor(mut self, executor: Box<dyn IterationExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<RunMetrics> {
        self.metrics.clone()
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Execute the run until the executor finishes or `shutdown` fires, then
    /// evaluate thresholds.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<RunReport> {
        let rendered = self.config.to_toml()?;
        let exporter = if self.config.metrics.enabled {
            let server = spawn_http_server(self.registry.clone(), self.config.metrics.listen)
                .await
                .context("failed to start metrics exporter")?;
            info!(addr = %server.addr(), "metrics exporter listening");
            Some(server)
        } else {
            None
        };

        let target = self.config.target.base_url.to_string();
        info!(
            version = %self.version.banner(),
            target = %target,
            executor = self.executor.name(),
            thresholds = self.thresholds.len(),
            "load test started"
        );
        let started_at = Utc::now();
        let iteration = Arc::new(ScenarioIteration {
            runner: self.runner.clone(),
            metrics: self.metrics.clone(),
        });
        let outcome = self.executor.execute(iteration, shutdown).await;
        let finished_at = Utc::now();

        if let Some(server) = exporter {
            if let Err(err) = server.shutdown().await {
                warn!(error = %err, "metrics exporter did not shut down cleanly");
            }
        }
        let executor = outcome.context("executor failed")?;

        let thresholds = self.thresholds.evaluate(&self.metrics);
        let passed = thresholds.iter().all(|result| result.passed);
        let report = RunReport {
            version: self.version.banner(),
            config_hash: config_hash(&rendered),
            target,
            started_at,
            finished_at,
            executor,
            metrics: self.metrics.snapshot(),
            thresholds,
            passed,
        };
        info!(
            passed,
            iterations = report.executor.started,
            dropped = report.executor.dropped,
            "load test finished"
        );

        if let Some(path) = &self.config.report.summary_path {
            report.write_json(path)?;
            info!(path = %path.display(), "run summary written");
        }
        Ok(report)
    }
}
