//! ---
//! pvz_section: "01-core-functionality"
//! pvz_subsection: "tests"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Configuration loading and validation tests."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::io::Write;
use std::time::Duration;

use pvz_load_common::config::{ExecutorKind, LoadTestConfig, Role, BUILTIN_METRICS};

#[test]
fn defaults_match_reference_scenario() {
    let config = LoadTestConfig::default();
    config.validate().unwrap();
    assert_eq!(config.target.base_url.as_str(), "http://localhost:8080/");
    assert_eq!(config.scenario.role, Role::Moderator);
    assert_eq!(config.scenario.city, "Moscow");
    assert_eq!((config.scenario.page, config.scenario.limit), (1, 10));
    assert!(!config.scenario.optimized_listing);
    assert_eq!(config.executor.kind, ExecutorKind::ConstantArrivalRate);
    assert_eq!(config.executor.rate, 1000);
    assert_eq!(config.executor.time_unit, Duration::from_secs(1));
    assert_eq!(config.executor.duration, Duration::from_secs(60));
    assert_eq!(config.executor.pre_allocated_workers, 100);
    assert_eq!(config.executor.max_workers, 500);
    assert_eq!(config.thresholds["http_req_duration"], vec!["p(95)<100"]);
    assert_eq!(config.thresholds["http_req_failed"], vec!["rate<0.0001"]);
    assert_eq!(config.thresholds["scenario_errors"], vec!["rate<0.0001"]);
    assert_eq!(config.logging.directory, None);
}

#[test]
fn default_thresholds_follow_the_error_metric() {
    let config: LoadTestConfig = r#"
        [scenario]
        error_metric = "pvz_step_errors"
    "#
    .parse()
    .unwrap();

    let metrics: Vec<_> = config.thresholds.keys().map(String::as_str).collect();
    assert_eq!(
        metrics,
        vec!["http_req_duration", "http_req_failed", "pvz_step_errors"]
    );
    assert_eq!(config.thresholds["pvz_step_errors"], vec!["rate<0.0001"]);
}

#[test]
fn rejects_error_metric_named_like_a_builtin_series() {
    for builtin in BUILTIN_METRICS {
        let mut config = LoadTestConfig::default();
        config.scenario.error_metric = builtin.to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("built-in"), "{builtin}: {err}");
    }

    let err = r#"
        [scenario]
        error_metric = "http_req_failed"
    "#
    .parse::<LoadTestConfig>()
    .unwrap_err();
    assert!(format!("{err:#}").contains("http_req_failed"));
}

#[test]
fn parses_toml_with_human_durations() {
    let config: LoadTestConfig = r#"
        [target]
        base_url = "http://pvz.internal:9000"
        request_timeout = "5s"

        [scenario]
        role = "employee"
        city = "Kazan"
        limit = 25

        [executor]
        kind = "fixed-iterations"
        iterations = 20
        workers = 4

        [thresholds]
        checks = ["rate>0.99"]
    "#
    .parse()
    .unwrap();

    assert_eq!(config.target.base_url.host_str(), Some("pvz.internal"));
    assert_eq!(config.target.request_timeout, Duration::from_secs(5));
    assert_eq!(config.scenario.role, Role::Employee);
    assert_eq!(config.scenario.city, "Kazan");
    assert_eq!(config.scenario.page, 1);
    assert_eq!(config.scenario.limit, 25);
    assert_eq!(config.executor.kind, ExecutorKind::FixedIterations);
    assert_eq!(config.executor.iterations, 20);
    assert_eq!(config.thresholds.len(), 1);
    assert_eq!(config.thresholds["checks"], vec!["rate>0.99"]);
}

#[test]
fn rejects_inconsistent_worker_pool() {
    let err = r#"
        [executor]
        pre_allocated_workers = 10
        max_workers = 5
    "#
    .parse::<LoadTestConfig>()
    .unwrap_err();
    assert!(err.to_string().contains("max_workers"));
}

#[test]
fn rejects_zero_pagination_and_rate() {
    assert!("[scenario]\npage = 0\n".parse::<LoadTestConfig>().is_err());
    assert!("[executor]\nrate = 0\n".parse::<LoadTestConfig>().is_err());
    assert!("[target]\nbase_url = \"ftp://example.com\"\n"
        .parse::<LoadTestConfig>()
        .is_err());
}

#[test]
fn file_and_environment_layers_merge() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[executor]\nrate = 50\nduration = \"10s\"\n\n[scenario]\ncity = \"Kazan\""
    )
    .unwrap();

    std::env::set_var("PVZ_LOAD__EXECUTOR__RATE", "75");
    let loaded = LoadTestConfig::load(Some(file.path())).unwrap();
    std::env::remove_var("PVZ_LOAD__EXECUTOR__RATE");

    assert_eq!(loaded.source.as_deref(), Some(file.path()));
    assert_eq!(loaded.config.executor.rate, 75);
    assert_eq!(loaded.config.executor.duration, Duration::from_secs(10));
    assert_eq!(loaded.config.scenario.city, "Kazan");
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = LoadTestConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn effective_config_renders_back_to_toml() {
    let rendered = LoadTestConfig::default().to_toml().unwrap();
    assert!(rendered.contains("base_url = \"http://localhost:8080/\""));
    assert!(rendered.contains("duration = \"1m\""));
    let reparsed: LoadTestConfig = rendered.parse().unwrap();
    assert_eq!(reparsed.executor.max_workers, 500);
}

#[test]
fn reference_profile_parses() {
    let config: LoadTestConfig = include_str!("../../../configs/pvz-load.toml").parse().unwrap();
    assert_eq!(config.executor.rate, 1000);
    assert_eq!(config.executor.graceful_stop, Duration::from_secs(30));
    assert_eq!(
        config.report.summary_path.as_deref(),
        Some(std::path::Path::new("target/pvz-load-summary.json"))
    );
    assert_eq!(config.thresholds["scenario_errors"], vec!["rate<0.0001"]);
    assert_eq!(
        config.logging.directory.as_deref(),
        Some(std::path::Path::new("target/logs"))
    );
}
