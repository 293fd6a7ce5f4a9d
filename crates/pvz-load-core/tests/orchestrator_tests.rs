//! ---
//! pvz_section: "05-orchestration"
//! pvz_subsection: "tests"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Orchestrator runs over in-memory transports."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pvz_load_common::config::{ExecutorKind, LoadTestConfig};
use pvz_load_core::LoadTestOrchestrator;
use pvz_load_rt::{FixedIterations, ShutdownSignal};
use pvz_load_scenario::{ApiRequest, ApiResponse, HttpTransport, Method, TransportError};
use serde_json::json;

/// In-memory PVZ service; `login_status` controls the login answer and
/// `issue_token` whether a successful login carries a token.
struct InMemoryPvz {
    login_status: u16,
    issue_token: bool,
    created: AtomicU64,
}

impl InMemoryPvz {
    fn new(login_status: u16) -> Arc<Self> {
        Arc::new(Self {
            login_status,
            issue_token: true,
            created: AtomicU64::new(0),
        })
    }

    fn tokenless() -> Arc<Self> {
        Arc::new(Self {
            login_status: 200,
            issue_token: false,
            created: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl HttpTransport for InMemoryPvz {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let (status, body) = match (request.method, request.path) {
            (Method::Post, "dummyLogin") if self.login_status == 200 && self.issue_token => {
                (200, json!({"token": "abc"}))
            }
            (Method::Post, "dummyLogin") if self.login_status == 200 => (200, json!({})),
            (Method::Post, "dummyLogin") => (self.login_status, json!({"message": "denied"})),
            (Method::Post, "pvz") => {
                let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                (201, json!({"id": id.to_string(), "city": "Moscow"}))
            }
            _ => (200, json!([])),
        };
        Ok(ApiResponse {
            status,
            body: serde_json::to_vec(&body).unwrap().into(),
        })
    }
}

/// Never answers within any reasonable graceful stop.
struct StalledPvz;

#[async_trait]
impl HttpTransport for StalledPvz {
    async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, TransportError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ApiResponse {
            status: 200,
            body: serde_json::to_vec(&json!({"token": "late"})).unwrap().into(),
        })
    }
}

fn fixed_config(iterations: u64) -> LoadTestConfig {
    let mut config = LoadTestConfig::default();
    config.executor.kind = ExecutorKind::FixedIterations;
    config.executor.iterations = iterations;
    config.executor.workers = 2;
    config
}

#[tokio::test]
async fn healthy_service_passes_default_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fixed_config(5);
    config.report.summary_path = Some(dir.path().join("summary.json"));
    let service = InMemoryPvz::new(200);

    let orchestrator = LoadTestOrchestrator::with_transport(config, service.clone()).unwrap();
    let report = orchestrator.run(ShutdownSignal::never()).await.unwrap();

    assert!(report.passed, "{}", report.render_text());
    assert_eq!(report.executor.completed, 5);
    assert_eq!(report.metrics.http_reqs, 15);
    assert_eq!(report.metrics.step_errors.hits, 0);
    assert_eq!(report.metrics.step_errors.total(), 15);
    assert_eq!(report.metrics.iterations_completed, 5);
    assert_eq!(service.created.load(Ordering::SeqCst), 5);
    assert_eq!(report.config_hash.len(), 64);

    let written: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written["passed"], true);
}

#[tokio::test]
async fn rejected_login_crosses_thresholds() {
    let mut config = fixed_config(4);
    config
        .thresholds
        .insert("scenario_errors".into(), vec!["rate<0.5".into()]);
    let service = InMemoryPvz::new(401);

    let report = LoadTestOrchestrator::with_transport(config, service.clone())
        .unwrap()
        .run(ShutdownSignal::never())
        .await
        .unwrap();

    assert!(!report.passed);
    assert_eq!(report.executor.failed, 4);
    assert_eq!(report.metrics.http_reqs, 4);
    assert_eq!(report.metrics.step_errors.hits, 4);
    assert_eq!(report.metrics.iterations_failed, 4);
    assert_eq!(service.created.load(Ordering::SeqCst), 0);
    let crossed: Vec<_> = report.failed_thresholds().map(|t| t.metric.as_str()).collect();
    assert_eq!(crossed, vec!["http_req_failed", "scenario_errors"]);
}

#[tokio::test]
async fn failed_body_checks_cross_default_thresholds() {
    let report = LoadTestOrchestrator::with_transport(fixed_config(10), InMemoryPvz::tokenless())
        .unwrap()
        .run(ShutdownSignal::never())
        .await
        .unwrap();

    // Every login answers 200, so the request failure rate stays at zero.
    assert_eq!(report.metrics.http_req_failed.hits, 0);
    assert_eq!(report.metrics.step_errors.hits, 10);
    assert_eq!(report.metrics.iterations_failed, 10);
    assert!(!report.passed);
    let crossed: Vec<_> = report.failed_thresholds().map(|t| t.metric.as_str()).collect();
    assert_eq!(crossed, vec!["scenario_errors"]);
    assert!(report.render_text().contains("THRESHOLDS CROSSED"));
}

#[tokio::test(start_paused = true)]
async fn aborted_iterations_are_recorded_as_failed() {
    let mut config = LoadTestConfig::default();
    config.executor.rate = 2;
    config.executor.time_unit = Duration::from_secs(1);
    config.executor.duration = Duration::from_secs(1);
    config.executor.pre_allocated_workers = 2;
    config.executor.max_workers = 2;
    config.executor.graceful_stop = Duration::from_secs(1);

    let report = LoadTestOrchestrator::with_transport(config, Arc::new(StalledPvz))
        .unwrap()
        .run(ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.executor.started, 2);
    assert_eq!(report.executor.completed, 0);
    assert_eq!(report.executor.failed, 2);
    assert_eq!(report.metrics.iterations_completed, 0);
    assert_eq!(report.metrics.iterations_failed, report.executor.failed);
}

#[tokio::test]
async fn injected_executor_replaces_configured_one() {
    let orchestrator = LoadTestOrchestrator::with_transport(LoadTestConfig::default(), InMemoryPvz::new(200))
        .unwrap()
        .with_executor(Box::new(FixedIterations::new(3, 1)));

    let report = orchestrator.run(ShutdownSignal::never()).await.unwrap();
    assert_eq!(report.executor.executor, "fixed-iterations");
    assert_eq!(report.executor.completed, 3);
    assert_eq!(orchestrator.metrics().snapshot().iterations_completed, 3);
}

#[test]
fn unknown_threshold_metric_fails_construction() {
    let mut config = fixed_config(1);
    config
        .thresholds
        .insert("not_a_metric".into(), vec!["rate<1".into()]);
    let err = LoadTestOrchestrator::with_transport(config, InMemoryPvz::new(200))
        .err()
        .expect("construction should fail");
    assert!(format!("{err:#}").contains("not_a_metric"));
}
