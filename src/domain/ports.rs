use crate::domain::metrics::{EvaluationOutcome, Metrics};
use crate::domain::parameters::ParameterAssignment;
use crate::domain::types::EvaluationContext;
use anyhow::Result;
use async_trait::async_trait;

// Need async_trait for async functions in traits

/// The external backtest collaborator.
///
/// May fail or hang; the evaluator adapter owns recovery and timeouts. Not
/// specified here: how trades are simulated or where market data comes from.
#[async_trait]
pub trait BacktestService: Send + Sync {
    /// Runs one backtest for the given assignment over the context window.
    async fn evaluate(
        &self,
        assignment: &ParameterAssignment,
        context: &EvaluationContext,
    ) -> Result<Metrics>;

    /// Metric keys this collaborator produces, used to reject an unknown
    /// objective metric before a run starts.
    fn metric_names(&self) -> Vec<String>;
}

/// What the optimization core consumes: a total evaluation function.
///
/// Implementations never raise; every fault is folded into
/// [`EvaluationOutcome::Failure`]. Repeated calls with the same assignment
/// and context return equivalent outcomes.
#[async_trait]
pub trait ObjectiveEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        assignment: &ParameterAssignment,
        context: &EvaluationContext,
    ) -> EvaluationOutcome;

    fn metric_names(&self) -> Vec<String>;
}
