//! ---
//! pvz_section: "03-metrics-thresholds"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Threshold expressions evaluated at the end of a run."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
//! Threshold expressions use the familiar `aggregation op value` form, e.g.
//! `p(95)<100` over a latency trend (milliseconds) or `rate<0.01` over a
//! rate series.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::run::{MetricKind, RunMetrics};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThresholdError {
    #[error("invalid threshold expression '{expression}': {reason}")]
    Parse { expression: String, reason: String },
    #[error("threshold references unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("aggregation '{aggregation}' is not available on {kind:?} metric '{metric}'")]
    Unsupported {
        metric: String,
        aggregation: String,
        kind: MetricKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    Count,
}

impl Aggregation {
    fn supports(&self, kind: MetricKind) -> bool {
        match self {
            Aggregation::Avg
            | Aggregation::Min
            | Aggregation::Max
            | Aggregation::Med
            | Aggregation::Percentile(_) => kind == MetricKind::Trend,
            Aggregation::Rate => kind == MetricKind::Rate,
            Aggregation::Count => true,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({})", p),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            other => {
                let inner = other
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown aggregation '{}'", other))?;
                let percentile: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile '{}'", inner))?;
                if !(0.0..=100.0).contains(&percentile) {
                    return Err(format!("percentile {} outside 0..=100", percentile));
                }
                Ok(Aggregation::Percentile(percentile))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// One parsed `aggregation op value` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.aggregation,
            self.comparison.symbol(),
            self.bound
        )
    }
}

impl FromStr for ThresholdExpr {
    type Err = ThresholdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: String| ThresholdError::Parse {
            expression: input.to_owned(),
            reason,
        };
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let op_start = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| parse_error("missing comparison operator".into()))?;
        let (left, rest) = compact.split_at(op_start);
        let (comparison, right) = if let Some(right) = rest.strip_prefix("<=") {
            (Comparison::Le, right)
        } else if let Some(right) = rest.strip_prefix(">=") {
            (Comparison::Ge, right)
        } else if let Some(right) = rest.strip_prefix("==") {
            (Comparison::Eq, right)
        } else if let Some(right) = rest.strip_prefix("!=") {
            (Comparison::Ne, right)
        } else if let Some(right) = rest.strip_prefix('<') {
            (Comparison::Lt, right)
        } else if let Some(right) = rest.strip_prefix('>') {
            (Comparison::Gt, right)
        } else {
            return Err(parse_error(format!("unknown operator in '{}'", rest)));
        };

        let aggregation = left.parse::<Aggregation>().map_err(parse_error)?;
        let bound = right
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| parse_error(format!("invalid bound '{}'", right)))?;

        Ok(Self {
            aggregation,
            comparison,
            bound,
        })
    }
}

/// A threshold bound to the metric it observes.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub source: String,
    pub expr: ThresholdExpr,
}

/// Outcome of one threshold at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

/// All thresholds configured for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    /// Parse configured expressions, checking each one against the series the
    /// run records. `kind_of` resolves a metric name to its kind.
    pub fn parse(
        config: &IndexMap<String, Vec<String>>,
        kind_of: impl Fn(&str) -> Option<MetricKind>,
    ) -> Result<Self, ThresholdError> {
        let mut thresholds = Vec::new();
        for (metric, expressions) in config {
            let kind =
                kind_of(metric).ok_or_else(|| ThresholdError::UnknownMetric(metric.clone()))?;
            for source in expressions {
                let expr = source.parse::<ThresholdExpr>()?;
                if !expr.aggregation.supports(kind) {
                    return Err(ThresholdError::Unsupported {
                        metric: metric.clone(),
                        aggregation: expr.aggregation.to_string(),
                        kind,
                    });
                }
                thresholds.push(Threshold {
                    metric: metric.clone(),
                    source: source.trim().to_owned(),
                    expr,
                });
            }
        }
        Ok(Self { thresholds })
    }

    /// Parse against the series recorded by `metrics`.
    pub fn for_run(
        config: &IndexMap<String, Vec<String>>,
        metrics: &RunMetrics,
    ) -> Result<Self, ThresholdError> {
        Self::parse(config, |metric| metrics.kind_of(metric))
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.thresholds.iter()
    }

    pub fn evaluate(&self, metrics: &RunMetrics) -> Vec<ThresholdResult> {
        self.thresholds
            .iter()
            .map(|threshold| {
                let observed = observe(metrics, &threshold.metric, threshold.expr.aggregation);
                let passed = threshold.expr.comparison.holds(observed, threshold.expr.bound);
                if passed {
                    info!(metric = %threshold.metric, expression = %threshold.source, observed, "threshold passed");
                } else {
                    warn!(metric = %threshold.metric, expression = %threshold.source, observed, "threshold crossed");
                }
                ThresholdResult {
                    metric: threshold.metric.clone(),
                    expression: threshold.source.clone(),
                    observed,
                    passed,
                }
            })
            .collect()
    }
}

fn observe(metrics: &RunMetrics, metric: &str, aggregation: Aggregation) -> f64 {
    match aggregation {
        Aggregation::Percentile(p) => metrics.durations().percentile_ms(p),
        Aggregation::Avg => metrics.durations().summary().avg_ms,
        Aggregation::Min => metrics.durations().summary().min_ms,
        Aggregation::Max => metrics.durations().summary().max_ms,
        Aggregation::Med => metrics.durations().percentile_ms(50.0),
        Aggregation::Rate => metrics.rate(metric).map(|r| r.rate()).unwrap_or_default(),
        Aggregation::Count => metrics
            .count(metric)
            .or_else(|| metrics.rate(metric).map(|r| r.total()))
            .unwrap_or_else(|| metrics.durations().len()) as f64,
    }
}
