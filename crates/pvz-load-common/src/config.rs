//! ---
//! pvz_section: "01-core-functionality"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Layered configuration for load-test runs."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_base_url() -> Url {
    Url::parse("http://localhost:8080").expect("valid default base url")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_city() -> String {
    "Moscow".to_owned()
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

fn default_error_metric() -> String {
    "scenario_errors".to_owned()
}

fn default_rate() -> u64 {
    1000
}

fn default_time_unit() -> Duration {
    Duration::from_secs(1)
}

fn default_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_pre_allocated_workers() -> usize {
    100
}

fn default_max_workers() -> usize {
    500
}

fn default_graceful_stop() -> Duration {
    Duration::from_secs(30)
}

fn default_iterations() -> u64 {
    1
}

fn default_workers() -> usize {
    1
}

/// Series every run records regardless of configuration.
pub const BUILTIN_METRICS: [&str; 6] = [
    "http_req_duration",
    "http_req_failed",
    "http_reqs",
    "checks",
    "iterations",
    "dropped_iterations",
];

/// Thresholds applied when the profile names none; the step error series
/// is held to the same bound as failed requests.
pub fn default_thresholds(error_metric: &str) -> IndexMap<String, Vec<String>> {
    let mut thresholds = IndexMap::new();
    thresholds.insert("http_req_duration".to_owned(), vec!["p(95)<100".to_owned()]);
    thresholds.insert("http_req_failed".to_owned(), vec!["rate<0.0001".to_owned()]);
    thresholds.insert(error_metric.to_owned(), vec!["rate<0.0001".to_owned()]);
    thresholds
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_metrics_listen() -> SocketAddr {
    "127.0.0.1:9899"
        .parse()
        .expect("valid default metrics address")
}

/// Complete configuration for a single load-test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Threshold expressions keyed by metric name. An empty table selects
    /// [`default_thresholds`] for the configured error series.
    #[serde(default)]
    pub thresholds: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Configuration together with the file it was read from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: LoadTestConfig,
    pub source: Option<PathBuf>,
}

impl LoadTestConfig {
    pub const ENV_CONFIG_PATH: &'static str = "PVZ_LOAD_CONFIG";
    pub const ENV_PREFIX: &'static str = "PVZ_LOAD";

    /// Load configuration from an optional file, the `PVZ_LOAD_CONFIG` override,
    /// and `PVZ_LOAD__SECTION__KEY` environment variables, in increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<LoadedConfig> {
        let source = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var(Self::ENV_CONFIG_PATH)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };

        let mut builder = Config::builder();
        if let Some(path) = &source {
            debug!(config_path = %path.display(), "loading configuration");
            if !path.exists() {
                return Err(anyhow!("configuration file {} not found", path.display()));
            }
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .with_context(|| "failed to assemble configuration sources")?
            .try_deserialize::<LoadTestConfig>()
            .with_context(|| match &source {
                Some(path) => format!("failed to parse config file {}", path.display()),
                None => "failed to parse configuration from environment".to_owned(),
            })?
            .with_default_thresholds();
        config.validate()?;
        Ok(LoadedConfig { config, source })
    }

    /// Validate structural invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        self.scenario.validate()?;
        self.executor.validate()?;
        for (metric, expressions) in &self.thresholds {
            if metric.trim().is_empty() {
                return Err(anyhow!("threshold metric name cannot be empty"));
            }
            if expressions.iter().any(|expr| expr.trim().is_empty()) {
                return Err(anyhow!("threshold for '{}' contains an empty expression", metric));
            }
        }
        Ok(())
    }

    fn with_default_thresholds(mut self) -> Self {
        if self.thresholds.is_empty() {
            self.thresholds = default_thresholds(&self.scenario.error_metric);
        }
        self
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialise configuration to TOML")
    }
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            scenario: ScenarioConfig::default(),
            executor: ExecutorConfig::default(),
            thresholds: default_thresholds(&default_error_metric()),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl std::str::FromStr for LoadTestConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .with_context(|| "failed to parse configuration")?
            .try_deserialize::<LoadTestConfig>()
            .with_context(|| "failed to parse configuration")?
            .with_default_thresholds();
        config.validate()?;
        Ok(config)
    }
}

/// Where the service under test lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl TargetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.cannot_be_a_base() {
            return Err(anyhow!("target base_url {} cannot be used as a base", self.base_url));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "target base_url must use http or https, got '{}'",
                self.base_url.scheme()
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("target request_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Role requested from the dummy login endpoint.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Employee,
    #[default]
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Employee => "employee",
            Role::Moderator => "moderator",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "employee" => Ok(Role::Employee),
            "moderator" => Ok(Role::Moderator),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payloads issued by every iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Also exercise `GET /pvz/optimized` after the regular listing.
    #[serde(default)]
    pub optimized_listing: bool,
    /// Name of the per-step error-rate series.
    #[serde(default = "default_error_metric")]
    pub error_metric: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            role: Role::default(),
            city: default_city(),
            page: default_page(),
            limit: default_limit(),
            optimized_listing: false,
            error_metric: default_error_metric(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.city.trim().is_empty() {
            return Err(anyhow!("scenario city cannot be empty"));
        }
        if self.page == 0 || self.limit == 0 {
            return Err(anyhow!("scenario page and limit must be positive"));
        }
        if self.error_metric.trim().is_empty() {
            return Err(anyhow!("scenario error_metric cannot be empty"));
        }
        if BUILTIN_METRICS.contains(&self.error_metric.as_str()) {
            return Err(anyhow!(
                "scenario error_metric '{}' collides with a built-in series",
                self.error_metric
            ));
        }
        Ok(())
    }
}

/// Scheduling strategy used to start iterations.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    #[default]
    ConstantArrivalRate,
    FixedIterations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub kind: ExecutorKind,
    /// Iterations started per `time_unit`.
    #[serde(default = "default_rate")]
    pub rate: u64,
    #[serde(default = "default_time_unit", with = "humantime_serde")]
    pub time_unit: Duration,
    #[serde(default = "default_duration", with = "humantime_serde")]
    pub duration: Duration,
    #[serde(default = "default_pre_allocated_workers")]
    pub pre_allocated_workers: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_graceful_stop", with = "humantime_serde")]
    pub graceful_stop: Duration,
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            rate: default_rate(),
            time_unit: default_time_unit(),
            duration: default_duration(),
            pre_allocated_workers: default_pre_allocated_workers(),
            max_workers: default_max_workers(),
            graceful_stop: default_graceful_stop(),
            iterations: default_iterations(),
            workers: default_workers(),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            ExecutorKind::ConstantArrivalRate => {
                if self.rate == 0 {
                    return Err(anyhow!("executor rate must be greater than zero"));
                }
                if self.time_unit.is_zero() {
                    return Err(anyhow!("executor time_unit must be greater than zero"));
                }
                if self.duration.is_zero() {
                    return Err(anyhow!("executor duration must be greater than zero"));
                }
                if self.max_workers == 0 {
                    return Err(anyhow!("executor max_workers must be greater than zero"));
                }
                if self.max_workers < self.pre_allocated_workers {
                    return Err(anyhow!(
                        "executor max_workers ({}) must not be lower than pre_allocated_workers ({})",
                        self.max_workers,
                        self.pre_allocated_workers
                    ));
                }
            }
            ExecutorKind::FixedIterations => {
                if self.iterations == 0 || self.workers == 0 {
                    return Err(anyhow!(
                        "fixed-iterations executor needs positive iterations and workers"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for a daily rolling JSON log; stdout only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Write the end-of-run summary as JSON to this path.
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
}
