//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Scenario steps, payloads, and response field access."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::fmt;

use pvz_load_common::config::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Steps of one iteration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Login,
    CreatePvz,
    ListPvz,
    ListPvzOptimized,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Login => "login",
            Step::CreatePvz => "create_pvz",
            Step::ListPvz => "list_pvz",
            Step::ListPvzOptimized => "list_pvz_optimized",
        }
    }

    /// Status the service answers with when the step succeeds.
    pub fn expected_status(&self) -> u16 {
        match self {
            Step::CreatePvz => 201,
            Step::Login | Step::ListPvz | Step::ListPvzOptimized => 200,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DummyLoginRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatePvzRequest {
    pub city: String,
}

/// Identifier returned for a created pickup point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PvzId(pub String);

impl fmt::Display for PvzId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer token issued by the login step; lives for one iteration only.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens stay out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// JavaScript-style truthiness of a JSON value: absent, `null`, `false`,
/// `0`, `NaN`, and `""` are falsy; everything else, including empty arrays
/// and objects, is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn field_text(body: &Value, field: &str) -> Option<String> {
    let value = body.get(field);
    if !is_truthy(value) {
        return None;
    }
    value.map(|value| match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

pub(crate) fn extract_token(body: &Value) -> Option<SessionToken> {
    field_text(body, "token").map(SessionToken)
}

pub(crate) fn extract_pvz_id(body: &Value) -> Option<PvzId> {
    field_text(body, "id").map(PvzId)
}
