//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Sequential login, create, list iteration."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Instant;

use pvz_load_common::config::ScenarioConfig;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::checks::checks_for;
use crate::error::{StepError, StepFailure, TransportError};
use crate::model::{
    extract_pvz_id, extract_token, CreatePvzRequest, DummyLoginRequest, PvzId, Step,
};
use crate::observer::ScenarioObserver;
use crate::transport::{ApiRequest, HttpTransport};

const LOGIN_PATH: &str = "dummyLogin";
const PVZ_PATH: &str = "pvz";
const PVZ_OPTIMIZED_PATH: &str = "pvz/optimized";

/// What a fully successful iteration produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationSummary {
    pub iteration: u64,
    pub pvz_id: PvzId,
    pub listed: usize,
}

pub type IterationOutcome = Result<IterationSummary, StepError>;

/// Runs the PVZ scenario one iteration at a time. Holds no per-iteration
/// state, so a single runner is shared by every worker.
pub struct ScenarioRunner {
    transport: Arc<dyn HttpTransport>,
    observer: Arc<dyn ScenarioObserver>,
    settings: ScenarioConfig,
}

impl ScenarioRunner {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        observer: Arc<dyn ScenarioObserver>,
        settings: ScenarioConfig,
    ) -> Self {
        Self {
            transport,
            observer,
            settings,
        }
    }

    pub fn settings(&self) -> &ScenarioConfig {
        &self.settings
    }

    /// Execute login, create, and list in order; the first failing step ends
    /// the iteration.
    pub async fn run_iteration(&self, iteration: u64) -> IterationOutcome {
        let result = self.run_steps(iteration).await;
        if let Err(err) = &result {
            warn!(iteration, step = %err.step(), error = %err, "iteration aborted");
        }
        result
    }

    async fn run_steps(&self, iteration: u64) -> Result<IterationSummary, StepError> {
        let login = ApiRequest::post(
            LOGIN_PATH,
            &DummyLoginRequest {
                role: self.settings.role,
            },
        );
        let body = self.execute(Step::Login, login).await?;
        let token = extract_token(&body).ok_or_else(|| missing_field(Step::Login))?;

        let create = ApiRequest::post(
            PVZ_PATH,
            &CreatePvzRequest {
                city: self.settings.city.clone(),
            },
        )
        .map(|request| request.with_bearer(&token));
        let body = self.execute(Step::CreatePvz, create).await?;
        let pvz_id = extract_pvz_id(&body).ok_or_else(|| missing_field(Step::CreatePvz))?;

        let list = ApiRequest::get(PVZ_PATH)
            .with_query("page", self.settings.page)
            .with_query("limit", self.settings.limit)
            .with_bearer(&token);
        let body = self.execute(Step::ListPvz, Ok(list)).await?;
        let listed = body.as_array().map(Vec::len).unwrap_or_default();

        if self.settings.optimized_listing {
            let optimized = ApiRequest::get(PVZ_OPTIMIZED_PATH)
                .with_query("page", self.settings.page)
                .with_query("limit", self.settings.limit)
                .with_bearer(&token);
            self.execute(Step::ListPvzOptimized, Ok(optimized)).await?;
        }

        debug!(iteration, pvz_id = %pvz_id, listed, "iteration completed");
        Ok(IterationSummary {
            iteration,
            pvz_id,
            listed,
        })
    }

    /// Send one request, feed every observation, and decide pass/fail.
    /// Returns the parsed body when all checks pass. A request that could not
    /// be built is observed like one that got no response.
    async fn execute(
        &self,
        step: Step,
        request: Result<ApiRequest, TransportError>,
    ) -> Result<Value, StepError> {
        let started = Instant::now();
        let outcome = match request {
            Ok(request) => self.transport.send(request).await,
            Err(err) => Err(err),
        };
        let latency = started.elapsed();

        let (status, body, transport) = match outcome {
            Ok(response) => (
                response.status,
                serde_json::from_slice::<Value>(&response.body).ok(),
                None,
            ),
            Err(err) => (0, None, Some(err.to_string())),
        };
        self.observer.on_request(step, status, latency);

        let mut failed_checks = Vec::new();
        for check in checks_for(step) {
            let passed = check.evaluate(status, body.as_ref());
            self.observer.on_check(step, check.name, passed);
            if !passed {
                failed_checks.push(check.name);
            }
        }

        let failed = !failed_checks.is_empty();
        self.observer.on_step(step, failed);
        if failed {
            return Err(StepError::new(
                step,
                StepFailure {
                    status,
                    failed_checks,
                    transport,
                },
            ));
        }
        Ok(body.unwrap_or(Value::Null))
    }
}

// The truthiness checks already gate extraction.
fn missing_field(step: Step) -> StepError {
    StepError::new(
        step,
        StepFailure {
            status: step.expected_status(),
            failed_checks: checks_for(step).iter().skip(1).map(|c| c.name).collect(),
            transport: None,
        },
    )
}
