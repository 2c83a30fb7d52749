//! Open named-number metrics map and the evaluation outcome type.
//!
//! The backtest collaborator decides which metrics exist; the core only
//! addresses them by string key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical metric keys produced by the collaborators shipped with this
/// crate. External evaluators may produce any superset.
pub const SHARPE_RATIO: &str = "sharpe_ratio";
pub const TOTAL_RETURN: &str = "total_return";
pub const MAX_DRAWDOWN: &str = "max_drawdown";
pub const WIN_RATE: &str = "win_rate";

/// Named numeric performance metrics from one backtest evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics(pub BTreeMap<String, f64>);

impl Metrics {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

/// Result of evaluating one candidate assignment.
///
/// Failures are non-fatal to a run: they are carried on the candidate list
/// for diagnostics and excluded from ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Success { metrics: Metrics },
    Failure { reason: String },
}

impl EvaluationOutcome {
    pub fn success(metrics: Metrics) -> Self {
        EvaluationOutcome::Success { metrics }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        EvaluationOutcome::Failure { reason: reason.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationOutcome::Success { .. })
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            EvaluationOutcome::Success { metrics } => Some(metrics),
            EvaluationOutcome::Failure { .. } => None,
        }
    }

    /// The value of the named objective metric, if this outcome is a success
    /// and the value is finite. Non-finite objective values are treated the
    /// same as failures by every consumer.
    pub fn objective(&self, metric: &str) -> Option<f64> {
        self.metrics()
            .and_then(|m| m.get(metric))
            .filter(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_extraction() {
        let outcome = EvaluationOutcome::success(
            Metrics::new().with(SHARPE_RATIO, 1.4).with(WIN_RATE, 0.6),
        );
        assert_eq!(outcome.objective(SHARPE_RATIO), Some(1.4));
        assert_eq!(outcome.objective("unknown"), None);

        let failed = EvaluationOutcome::failure("bad window");
        assert_eq!(failed.objective(SHARPE_RATIO), None);
        assert!(!failed.is_success());
    }

    #[test]
    fn test_non_finite_objective_is_rejected() {
        let outcome = EvaluationOutcome::success(Metrics::new().with(SHARPE_RATIO, f64::NAN));
        assert_eq!(outcome.objective(SHARPE_RATIO), None);
    }
}
