//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Named response checks per scenario step."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use serde_json::Value;

use crate::model::{is_truthy, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Criterion {
    Status(u16),
    TruthyField(&'static str),
    JsonArray,
}

/// A named success criterion applied to a step's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    criterion: Criterion,
}

impl Check {
    const fn new(name: &'static str, criterion: Criterion) -> Self {
        Self { name, criterion }
    }

    /// `body` is `None` when the response was not valid JSON.
    pub fn evaluate(&self, status: u16, body: Option<&Value>) -> bool {
        match self.criterion {
            Criterion::Status(expected) => status == expected,
            Criterion::TruthyField(field) => is_truthy(body.and_then(|body| body.get(field))),
            Criterion::JsonArray => matches!(body, Some(Value::Array(_))),
        }
    }
}

const LOGIN_CHECKS: [Check; 2] = [
    Check::new("login status 200", Criterion::Status(200)),
    Check::new("token present", Criterion::TruthyField("token")),
];

const CREATE_CHECKS: [Check; 2] = [
    Check::new("pvz status 201", Criterion::Status(201)),
    Check::new("pvz id present", Criterion::TruthyField("id")),
];

const LIST_CHECKS: [Check; 2] = [
    Check::new("get pvz status 200", Criterion::Status(200)),
    Check::new("get pvz returns array", Criterion::JsonArray),
];

const OPTIMIZED_LIST_CHECKS: [Check; 2] = [
    Check::new("optimized get pvz status 200", Criterion::Status(200)),
    Check::new("optimized get pvz returns array", Criterion::JsonArray),
];

pub fn checks_for(step: Step) -> &'static [Check] {
    match step {
        Step::Login => &LOGIN_CHECKS,
        Step::CreatePvz => &CREATE_CHECKS,
        Step::ListPvz => &LIST_CHECKS,
        Step::ListPvzOptimized => &OPTIMIZED_LIST_CHECKS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failed(step: Step, status: u16, body: Option<Value>) -> Vec<&'static str> {
        checks_for(step)
            .iter()
            .filter(|check| !check.evaluate(status, body.as_ref()))
            .map(|check| check.name)
            .collect()
    }

    #[test]
    fn login_requires_status_and_token() {
        assert!(failed(Step::Login, 200, Some(json!({"token": "abc"}))).is_empty());
        assert_eq!(
            failed(Step::Login, 401, Some(json!({"message": "unauthorized"}))),
            vec!["login status 200", "token present"]
        );
        assert_eq!(
            failed(Step::Login, 200, Some(json!({"token": ""}))),
            vec!["token present"]
        );
    }

    #[test]
    fn creation_expects_201() {
        assert_eq!(
            failed(Step::CreatePvz, 200, Some(json!({"id": "1"}))),
            vec!["pvz status 201"]
        );
    }

    #[test]
    fn listing_accepts_only_arrays() {
        assert!(failed(Step::ListPvz, 200, Some(json!([]))).is_empty());
        assert_eq!(
            failed(Step::ListPvz, 200, Some(json!({"items": []}))),
            vec!["get pvz returns array"]
        );
        assert_eq!(
            failed(Step::ListPvz, 200, None),
            vec!["get pvz returns array"]
        );
    }
}
