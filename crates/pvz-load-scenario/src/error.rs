//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Scenario error taxonomy."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::fmt;

use crate::model::Step;

/// Errors raised by an [`HttpTransport`](crate::transport::HttpTransport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid request path '{path}': {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Why a step did not meet its success criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Observed status; `0` when no response arrived.
    pub status: u16,
    pub failed_checks: Vec<&'static str>,
    pub transport: Option<String>,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.transport {
            Some(reason) => write!(f, "no response ({})", reason),
            None => write!(
                f,
                "status {}, failed checks: {}",
                self.status,
                self.failed_checks.join(", ")
            ),
        }
    }
}

/// Terminal failure of one iteration, named after the step that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("failed to get token: {0}")]
    Authentication(StepFailure),
    #[error("failed to create pvz: {0}")]
    Creation(StepFailure),
    #[error("failed to get pvz list: {0}")]
    Listing(StepFailure),
    #[error("failed to get optimized pvz list: {0}")]
    OptimizedListing(StepFailure),
}

impl StepError {
    pub fn new(step: Step, failure: StepFailure) -> Self {
        match step {
            Step::Login => StepError::Authentication(failure),
            Step::CreatePvz => StepError::Creation(failure),
            Step::ListPvz => StepError::Listing(failure),
            Step::ListPvzOptimized => StepError::OptimizedListing(failure),
        }
    }

    pub fn step(&self) -> Step {
        match self {
            StepError::Authentication(_) => Step::Login,
            StepError::Creation(_) => Step::CreatePvz,
            StepError::Listing(_) => Step::ListPvz,
            StepError::OptimizedListing(_) => Step::ListPvzOptimized,
        }
    }

    pub fn failure(&self) -> &StepFailure {
        match self {
            StepError::Authentication(failure)
            | StepError::Creation(failure)
            | StepError::Listing(failure)
            | StepError::OptimizedListing(failure) => failure,
        }
    }
}
