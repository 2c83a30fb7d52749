//! Result types produced by a run: evaluated candidates, convergence trace,
//! cross-validation folds and sensitivity scores.

use crate::domain::errors::OptimizeError;
use crate::domain::metrics::EvaluationOutcome;
use crate::domain::parameters::{ParameterAssignment, ParameterValue};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One candidate assignment together with its evaluation outcome.
///
/// `rank` is the 1-based position after sorting all successful candidates by
/// the configured objective; failed candidates keep `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedCandidate {
    pub assignment: ParameterAssignment,
    pub outcome: EvaluationOutcome,
    pub rank: Option<usize>,
}

/// Best-so-far objective value after a given evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub iteration_index: usize,
    pub best_metric_value_so_far: f64,
}

/// Complete outcome of one optimization run.
///
/// `candidates` holds successes first in rank order, then failures; whenever
/// at least one evaluation succeeded, `best_assignment` equals
/// `candidates[0].assignment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best_assignment: ParameterAssignment,
    pub best_metric_value: f64,
    pub candidates: Vec<EvaluatedCandidate>,
    pub convergence: Vec<ConvergencePoint>,
    pub duration_ms: u64,
    /// True when the run stopped on a cancellation signal with partial
    /// progress rather than running to completion.
    pub cancelled: bool,
}

impl OptimizationResult {
    pub fn successful_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.outcome.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.candidates.len() - self.successful_count()
    }
}

/// A contiguous historical time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Partitions the window into `k` contiguous, non-overlapping sub-windows
    /// that cover it exactly. Second-resolution lengths differ by at most one
    /// second: the remainder of the division goes to the earliest folds.
    pub fn split(&self, k: usize) -> Result<Vec<TimeWindow>, OptimizeError> {
        if k < 2 {
            return Err(OptimizeError::InsufficientData {
                reason: format!("fold count must be at least 2, got {}", k),
            });
        }
        let total_secs = self.duration().num_seconds();
        if total_secs <= 0 {
            return Err(OptimizeError::InsufficientData {
                reason: "evaluation window is empty".to_string(),
            });
        }
        let base = total_secs / k as i64;
        let remainder = total_secs % k as i64;

        let mut folds = Vec::with_capacity(k);
        let mut cursor = self.start;
        for i in 0..k as i64 {
            let len = base + if i < remainder { 1 } else { 0 };
            let end = cursor + Duration::seconds(len);
            folds.push(TimeWindow::new(cursor, end));
            cursor = end;
        }
        Ok(folds)
    }
}

/// The opaque base context handed through to the backtest collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub window: TimeWindow,
    pub symbols: Vec<String>,
    pub initial_capital: f64,
}

impl EvaluationContext {
    pub fn new(window: TimeWindow, symbols: Vec<String>, initial_capital: f64) -> Self {
        Self { window, symbols, initial_capital }
    }

    /// Same context over a different time window (used by cross-validation).
    pub fn with_window(&self, window: TimeWindow) -> Self {
        Self {
            window,
            symbols: self.symbols.clone(),
            initial_capital: self.initial_capital,
        }
    }
}

/// One cross-validation fold: a sub-window and the outcome of re-evaluating
/// the best assignment against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationFold {
    pub fold_index: usize,
    pub window: TimeWindow,
    pub outcome: EvaluationOutcome,
}

/// Marginal effect of one parameter on the objective, all others held at the
/// best assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub parameter_name: String,
    /// Normalized to [0, 1]; the most impactful parameter in a run scores
    /// exactly 1.0 unless the objective is flat everywhere.
    pub sensitivity_score: f64,
    pub optimal_value: Option<ParameterValue>,
    pub description: String,
}
