//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "PVZ service scenario: steps, checks, and transport."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
//! One iteration logs in as a dummy user, creates a pickup point, and lists
//! pickup points. Every step is checked and observed before the next runs.

pub mod checks;
pub mod error;
pub mod model;
pub mod observer;
pub mod runner;
pub mod transport;

pub use checks::{checks_for, Check};
pub use error::{StepError, StepFailure, TransportError};
pub use model::{is_truthy, CreatePvzRequest, DummyLoginRequest, PvzId, SessionToken, Step};
pub use observer::ScenarioObserver;
pub use runner::{IterationOutcome, IterationSummary, ScenarioRunner};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
