//! High-level facade over the optimization loop, cross-validation and
//! sensitivity analysis. The CLI and embedders talk to this instead of
//! wiring the runners individually.

use crate::application::cross_validation::CrossValidationRunner;
use crate::application::evaluator::EvaluatorAdapter;
use crate::application::orchestrator::{
    CancelHandle, OptimizationConfig, Orchestrator, ProgressCallback,
};
use crate::application::sensitivity::SensitivityAnalyzer;
use crate::application::strategies::ObjectiveSpec;
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{ParameterAssignment, ParameterSpace};
use crate::domain::ports::{BacktestService, ObjectiveEvaluator};
use crate::domain::types::{
    CrossValidationFold, EvaluationContext, OptimizationResult, SensitivityResult,
};
use std::sync::Arc;

pub struct OptimizeEngine {
    evaluator: Arc<dyn ObjectiveEvaluator>,
    cancel: CancelHandle,
    progress: Option<ProgressCallback>,
    max_concurrency: usize,
}

impl OptimizeEngine {
    pub fn new(evaluator: Arc<dyn ObjectiveEvaluator>) -> Self {
        Self {
            evaluator,
            cancel: CancelHandle::new(),
            progress: None,
            max_concurrency: 4,
        }
    }

    /// Wraps a raw backtest collaborator in the standard adapter (timeout
    /// enforcement, error-to-failure conversion).
    pub fn from_backtest(backtest: Arc<dyn BacktestService>) -> Self {
        Self::new(Arc::new(EvaluatorAdapter::new(backtest)))
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Handle for cancelling whatever run is in flight. Cloneable, safe to
    /// hand to a signal handler.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    pub async fn run_optimization(
        &self,
        config: &OptimizationConfig,
    ) -> Result<OptimizationResult, OptimizeError> {
        let mut orchestrator =
            Orchestrator::new(Arc::clone(&self.evaluator)).with_cancel(self.cancel.clone());
        if let Some(progress) = &self.progress {
            orchestrator = orchestrator.with_progress(Arc::clone(progress));
        }
        orchestrator.run(config).await
    }

    pub async fn run_cross_validation(
        &self,
        assignment: &ParameterAssignment,
        context: &EvaluationContext,
        fold_count: usize,
    ) -> Result<Vec<CrossValidationFold>, OptimizeError> {
        CrossValidationRunner::new(Arc::clone(&self.evaluator))
            .with_max_concurrency(self.max_concurrency)
            .run(assignment, context, fold_count)
            .await
    }

    pub async fn run_sensitivity_analysis(
        &self,
        space: &ParameterSpace,
        assignment: &ParameterAssignment,
        context: &EvaluationContext,
        objective: ObjectiveSpec,
    ) -> Result<Vec<SensitivityResult>, OptimizeError> {
        SensitivityAnalyzer::new(Arc::clone(&self.evaluator), objective)
            .with_max_concurrency(self.max_concurrency)
            .run(space, assignment, context)
            .await
    }
}
