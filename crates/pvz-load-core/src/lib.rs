//! ---
//! pvz_section: "05-orchestration"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Primary load-test orchestration."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
//! Orchestrates one load-test run and produces its report.

mod bridge;
pub mod orchestrator;
pub mod report;

pub use orchestrator::LoadTestOrchestrator;
pub use report::RunReport;
