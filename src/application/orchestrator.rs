//! Optimization orchestrator.
//!
//! Drives the search-strategy loop against the iteration and time budgets,
//! fans each batch out to the evaluator with bounded concurrency, tracks
//! convergence, and ranks every successfully-evaluated candidate.

use crate::application::strategies::{
    Algorithm, AlgorithmParams, ObjectiveSpec, build_strategy,
};
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::ParameterSpace;
use crate::domain::ports::ObjectiveEvaluator;
use crate::domain::types::{
    ConvergencePoint, EvaluatedCandidate, EvaluationContext, OptimizationResult,
};
use futures::StreamExt;
use futures::stream;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Everything one optimization run needs to know.
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub space: ParameterSpace,
    pub algorithm: Algorithm,
    pub algorithm_params: AlgorithmParams,
    pub objective_metric: String,
    pub maximize: bool,
    pub iteration_budget: usize,
    pub time_budget: Option<Duration>,
    /// Seed for reproducible runs; a random seed is drawn when absent.
    pub seed: Option<u64>,
    /// Bound on concurrent evaluations within one batch.
    pub max_concurrency: usize,
    pub context: EvaluationContext,
}

impl OptimizationConfig {
    pub fn new(
        space: ParameterSpace,
        algorithm: Algorithm,
        objective_metric: &str,
        maximize: bool,
        iteration_budget: usize,
        context: EvaluationContext,
    ) -> Self {
        Self {
            space,
            algorithm,
            algorithm_params: AlgorithmParams::default(),
            objective_metric: objective_metric.to_string(),
            maximize,
            iteration_budget,
            time_budget: None,
            seed: None,
            max_concurrency: 4,
            context,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_algorithm_params(mut self, params: AlgorithmParams) -> Self {
        self.algorithm_params = params;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Rejects malformed spaces, empty budgets and objective metric keys the
    /// evaluator does not produce, before any evaluation is issued.
    pub fn validate(&self, evaluator: &dyn ObjectiveEvaluator) -> Result<(), OptimizeError> {
        self.space.validate()?;
        if self.iteration_budget == 0 {
            return Err(OptimizeError::InvalidConfig {
                reason: "iteration budget must be positive".to_string(),
            });
        }
        let available = evaluator.metric_names();
        if !available.contains(&self.objective_metric) {
            return Err(OptimizeError::UnknownMetric {
                metric: self.objective_metric.clone(),
                available,
            });
        }
        Ok(())
    }
}

/// Best-effort cancellation signal, shared with whoever needs to stop a run.
/// Raised between evaluations it stops new candidates from being issued; the
/// run returns the best result found so far.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Incremental convergence notifications, display-only.
pub type ProgressCallback = Arc<dyn Fn(&ConvergencePoint) + Send + Sync>;

pub struct Orchestrator {
    evaluator: Arc<dyn ObjectiveEvaluator>,
    cancel: CancelHandle,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(evaluator: Arc<dyn ObjectiveEvaluator>) -> Self {
        Self {
            evaluator,
            cancel: CancelHandle::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Shares an externally owned cancellation handle instead of the run's
    /// private one.
    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs the full search loop and returns the ranked result.
    ///
    /// Fatal errors (`InvalidDefinition`, `OutOfDomain`, `UnknownMetric`,
    /// `TotalFailure`) are raised; per-candidate failures are data on the
    /// candidate list.
    pub async fn run(
        &self,
        config: &OptimizationConfig,
    ) -> Result<OptimizationResult, OptimizeError> {
        config.validate(self.evaluator.as_ref())?;

        let objective = ObjectiveSpec::new(&config.objective_metric, config.maximize);
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut strategy = build_strategy(
            config.algorithm,
            &config.space,
            &objective,
            &config.algorithm_params,
            config.iteration_budget,
            StdRng::seed_from_u64(seed),
        );

        info!(
            "Optimization: algorithm={} objective={} ({}) budget={} seed={}",
            strategy.name(),
            config.objective_metric,
            if config.maximize { "maximize" } else { "minimize" },
            config.iteration_budget,
            seed,
        );

        let started = Instant::now();
        let mut candidates: Vec<EvaluatedCandidate> = Vec::new();
        let mut convergence: Vec<ConvergencePoint> = Vec::new();
        let mut best_score: Option<f64> = None;
        let mut cancelled = false;

        loop {
            if self.cancel.is_cancelled() {
                warn!("Optimization cancelled after {} evaluations", candidates.len());
                cancelled = true;
                break;
            }
            if let Some(budget) = config.time_budget {
                if started.elapsed() >= budget {
                    info!("Time budget exhausted after {} evaluations", candidates.len());
                    break;
                }
            }
            if candidates.len() >= config.iteration_budget {
                break;
            }

            let mut batch = strategy.next_batch(&candidates)?;
            if batch.is_empty() {
                break;
            }
            batch.truncate(config.iteration_budget - candidates.len());

            // Strategies clamp their proposals; a violation here is fatal by
            // contract, not a recoverable evaluation failure.
            for assignment in &batch {
                config.space.validate_assignment(assignment)?;
            }

            let evaluations = stream::iter(batch.into_iter().map(|assignment| {
                let evaluator = Arc::clone(&self.evaluator);
                let context = config.context.clone();
                let cancel = self.cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (assignment, None);
                    }
                    let outcome = evaluator.evaluate(&assignment, &context).await;
                    (assignment, Some(outcome))
                }
            }))
            .buffered(config.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

            for (assignment, maybe_outcome) in evaluations {
                let Some(outcome) = maybe_outcome else {
                    cancelled = true;
                    continue;
                };
                let score = objective.score(&outcome);
                candidates.push(EvaluatedCandidate {
                    assignment,
                    outcome,
                    rank: None,
                });

                if let Some(score) = score {
                    best_score = Some(match best_score {
                        Some(best) if best >= score => best,
                        _ => score,
                    });
                }
                // The trace starts with the first success and never regresses.
                if let Some(best) = best_score {
                    let point = ConvergencePoint {
                        iteration_index: candidates.len() - 1,
                        best_metric_value_so_far: objective.raw_value(best),
                    };
                    convergence.push(point);
                    if let Some(callback) = &self.progress {
                        callback(&point);
                    }
                }
            }

            if cancelled {
                break;
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = rank(candidates, &objective, convergence, duration_ms, cancelled)?;
        info!(
            "Optimization complete: {} evaluations ({} failed) in {}ms, best {}={:.6}",
            result.candidates.len(),
            result.failed_count(),
            result.duration_ms,
            config.objective_metric,
            result.best_metric_value,
        );
        Ok(result)
    }
}

/// Sorts successful candidates by the objective (direction-normalized, ties
/// favoring earlier discovery via stable sort), assigns 1-based ranks, and
/// appends failures unranked.
fn rank(
    candidates: Vec<EvaluatedCandidate>,
    objective: &ObjectiveSpec,
    convergence: Vec<ConvergencePoint>,
    duration_ms: u64,
    cancelled: bool,
) -> Result<OptimizationResult, OptimizeError> {
    let attempted = candidates.len();

    let mut scored: Vec<(EvaluatedCandidate, f64)> = Vec::new();
    let mut failed: Vec<EvaluatedCandidate> = Vec::new();
    for candidate in candidates {
        match objective.score(&candidate.outcome) {
            Some(score) => scored.push((candidate, score)),
            None => failed.push(candidate),
        }
    }

    if scored.is_empty() {
        return Err(OptimizeError::TotalFailure { attempted });
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let best_assignment = scored[0].0.assignment.clone();
    let best_metric_value = objective.raw_value(scored[0].1);

    let mut ranked: Vec<EvaluatedCandidate> = scored
        .into_iter()
        .enumerate()
        .map(|(i, (mut candidate, _))| {
            candidate.rank = Some(i + 1);
            candidate
        })
        .collect();
    ranked.append(&mut failed);

    Ok(OptimizationResult {
        best_assignment,
        best_metric_value,
        candidates: ranked,
        convergence,
        duration_ms,
        cancelled,
    })
}
