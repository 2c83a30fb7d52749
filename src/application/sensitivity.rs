//! Per-parameter sensitivity analysis around a chosen assignment.
//!
//! One parameter is swept across its domain while the others stay fixed at
//! the base assignment. The induced objective range, normalized by the
//! largest range in the run, says which parameters the strategy actually
//! depends on and which are inert.

use crate::application::strategies::ObjectiveSpec;
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{
    ParameterAssignment, ParameterDefinition, ParameterDomain, ParameterSpace, ParameterValue,
};
use crate::domain::ports::ObjectiveEvaluator;
use crate::domain::types::{EvaluationContext, SensitivityResult};
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tracing::{info, warn};

/// Cap on swept lattice points per numeric parameter. Eleven evenly spaced
/// points resolve the shape of a one-dimensional response without turning the
/// sweep into a second optimization run.
pub const MAX_SAMPLES_PER_PARAMETER: usize = 11;

pub struct SensitivityAnalyzer {
    evaluator: Arc<dyn ObjectiveEvaluator>,
    objective: ObjectiveSpec,
    max_concurrency: usize,
}

impl SensitivityAnalyzer {
    pub fn new(evaluator: Arc<dyn ObjectiveEvaluator>, objective: ObjectiveSpec) -> Self {
        Self {
            evaluator,
            objective,
            max_concurrency: 4,
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Sweeps every parameter in the space around `base`. Results come back
    /// in declaration order, scores normalized so the most impactful
    /// parameter is exactly 1.0 (all zero when the objective is flat).
    pub async fn run(
        &self,
        space: &ParameterSpace,
        base: &ParameterAssignment,
        context: &EvaluationContext,
    ) -> Result<Vec<SensitivityResult>, OptimizeError> {
        space.validate()?;
        space.validate_assignment(base)?;

        let mut sweeps = Vec::with_capacity(space.parameters.len());
        for def in &space.parameters {
            sweeps.push(self.sweep(def, base, context).await);
        }

        let max_range = sweeps
            .iter()
            .filter_map(|s| s.range)
            .fold(0.0_f64, f64::max);

        let results = sweeps
            .into_iter()
            .map(|sweep| {
                let score = match sweep.range {
                    Some(range) if max_range > 0.0 => range / max_range,
                    _ => 0.0,
                };
                SensitivityResult {
                    parameter_name: sweep.name,
                    sensitivity_score: score,
                    optimal_value: sweep.optimal_value,
                    description: sweep.description,
                }
            })
            .collect();
        Ok(results)
    }

    /// Evaluates one parameter across its sample points, others fixed at the
    /// base assignment.
    async fn sweep(
        &self,
        def: &ParameterDefinition,
        base: &ParameterAssignment,
        context: &EvaluationContext,
    ) -> Sweep {
        let points = sample_points(def);
        info!(
            "Sensitivity: sweeping '{}' over {} values",
            def.name,
            points.len()
        );

        let outcomes: Vec<(ParameterValue, Option<f64>)> =
            stream::iter(points.into_iter().map(|value| {
                let evaluator = Arc::clone(&self.evaluator);
                let context = context.clone();
                let mut assignment = base.clone();
                assignment.set(&def.name, value.clone());
                let objective = self.objective.clone();
                async move {
                    let outcome = evaluator.evaluate(&assignment, &context).await;
                    (value, objective.score(&outcome))
                }
            }))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let successes: Vec<(&ParameterValue, f64)> = outcomes
            .iter()
            .filter_map(|(v, s)| s.map(|s| (v, s)))
            .collect();

        if successes.is_empty() {
            warn!("Sensitivity: every sample of '{}' failed", def.name);
            return Sweep {
                name: def.name.clone(),
                range: None,
                optimal_value: None,
                description: format!(
                    "all {} sampled values of '{}' failed to evaluate",
                    outcomes.len(),
                    def.name
                ),
            };
        }

        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut best: (&ParameterValue, f64) = successes[0];
        for &(value, score) in &successes {
            lo = lo.min(score);
            hi = hi.max(score);
            if score > best.1 {
                best = (value, score);
            }
        }

        Sweep {
            name: def.name.clone(),
            range: Some(hi - lo),
            optimal_value: Some(best.0.clone()),
            description: format!(
                "{} of {} samples succeeded; objective spans {:.6} to {:.6}",
                successes.len(),
                outcomes.len(),
                self.objective.raw_value(lo).min(self.objective.raw_value(hi)),
                self.objective.raw_value(lo).max(self.objective.raw_value(hi)),
            ),
        }
    }
}

struct Sweep {
    name: String,
    /// Induced objective range across successes; `None` when every sample
    /// failed.
    range: Option<f64>,
    optimal_value: Option<ParameterValue>,
    description: String,
}

/// The values to sweep for one parameter: all categorical values, the whole
/// numeric lattice when small, otherwise evenly spaced lattice points capped
/// at [`MAX_SAMPLES_PER_PARAMETER`].
fn sample_points(def: &ParameterDefinition) -> Vec<ParameterValue> {
    match &def.domain {
        ParameterDomain::Categorical { .. } => def.values(),
        _ => {
            let count = def.value_count();
            if count <= MAX_SAMPLES_PER_PARAMETER {
                return def.values();
            }
            let (min, max) = match &def.domain {
                ParameterDomain::Integer { min, max, .. } => (*min as f64, *max as f64),
                ParameterDomain::Float { min, max, .. } => (*min, *max),
                ParameterDomain::Categorical { .. } => unreachable!(),
            };
            let n = MAX_SAMPLES_PER_PARAMETER;
            let mut points = Vec::with_capacity(n);
            for i in 0..n {
                let x = min + (max - min) * i as f64 / (n - 1) as f64;
                let snapped = def.clamp(&ParameterValue::Float(x));
                if points.last() != Some(&snapped) {
                    points.push(snapped);
                }
            }
            points
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{EvaluationOutcome, Metrics, SHARPE_RATIO};
    use crate::domain::types::TimeWindow;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    /// Objective responds strongly to `period`, weakly to `weight`, ignores
    /// `mode`, and fails whenever `poison` is 1.
    struct ShapedEvaluator;

    #[async_trait]
    impl ObjectiveEvaluator for ShapedEvaluator {
        async fn evaluate(
            &self,
            assignment: &ParameterAssignment,
            _context: &EvaluationContext,
        ) -> EvaluationOutcome {
            if let Some(ParameterValue::Integer(1)) = assignment.get("poison") {
                return EvaluationOutcome::failure("poisoned");
            }
            let period = assignment
                .get("period")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let weight = assignment
                .get("weight")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let value = period / 10.0 + weight / 100.0;
            EvaluationOutcome::success(Metrics::new().with(SHARPE_RATIO, value))
        }

        fn metric_names(&self) -> Vec<String> {
            vec![SHARPE_RATIO.to_string()]
        }
    }

    fn context() -> EvaluationContext {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        EvaluationContext::new(
            TimeWindow::new(start, start + Duration::days(180)),
            vec!["QQQ".to_string()],
            10_000.0,
        )
    }

    fn analyzer() -> SensitivityAnalyzer {
        SensitivityAnalyzer::new(
            Arc::new(ShapedEvaluator),
            ObjectiveSpec::new(SHARPE_RATIO, true),
        )
    }

    #[tokio::test]
    async fn test_scores_normalized_and_ordered_by_impact() {
        let space = ParameterSpace::new(vec![
            ParameterDefinition::integer("period", 10, 50, 10, 20),
            ParameterDefinition::float("weight", 0.0, 1.0, 0.25, 0.5),
            ParameterDefinition::categorical("mode", &["a", "b"], "a"),
        ]);
        let results = analyzer()
            .run(&space, &space.defaults(), &context())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        let by_name = |n: &str| results.iter().find(|r| r.parameter_name == n).unwrap();

        // period induces range 4.0, weight 0.01, mode 0.0
        assert_eq!(by_name("period").sensitivity_score, 1.0);
        let weight = by_name("weight").sensitivity_score;
        assert!(weight > 0.0 && weight < 0.01);
        assert_eq!(by_name("mode").sensitivity_score, 0.0);

        // optimal_value follows the optimization direction
        assert_eq!(
            by_name("period").optimal_value,
            Some(ParameterValue::Integer(50))
        );
    }

    #[tokio::test]
    async fn test_numeric_sweep_capped_at_eleven_samples() {
        let def = ParameterDefinition::integer("period", 0, 1000, 1, 500);
        let points = sample_points(&def);
        assert_eq!(points.len(), MAX_SAMPLES_PER_PARAMETER);
        assert_eq!(points[0], ParameterValue::Integer(0));
        assert_eq!(points[10], ParameterValue::Integer(1000));
    }

    #[tokio::test]
    async fn test_small_lattice_swept_exhaustively() {
        let def = ParameterDefinition::integer("period", 10, 50, 10, 20);
        assert_eq!(sample_points(&def).len(), 5);
    }

    #[tokio::test]
    async fn test_partially_failing_parameter_is_tolerated() {
        let space = ParameterSpace::new(vec![
            ParameterDefinition::integer("period", 10, 50, 10, 20),
            ParameterDefinition::integer("poison", 0, 1, 1, 0),
        ]);
        let results = analyzer()
            .run(&space, &space.defaults(), &context())
            .await
            .unwrap();

        // Sweeping poison hits the failing value 1; only the base value 0
        // succeeds, leaving a single-point (zero) range.
        let poison = results.iter().find(|r| r.parameter_name == "poison").unwrap();
        assert_eq!(poison.sensitivity_score, 0.0);
        assert!(poison.description.contains("1 of 2 samples succeeded"));

        // The rest of the pass still produced real scores.
        let period = results.iter().find(|r| r.parameter_name == "period").unwrap();
        assert_eq!(period.sensitivity_score, 1.0);
    }

    #[tokio::test]
    async fn test_all_samples_failing_scores_zero_with_note_not_error() {
        struct AlwaysFailing;

        #[async_trait]
        impl ObjectiveEvaluator for AlwaysFailing {
            async fn evaluate(
                &self,
                _assignment: &ParameterAssignment,
                _context: &EvaluationContext,
            ) -> EvaluationOutcome {
                EvaluationOutcome::failure("no fills")
            }

            fn metric_names(&self) -> Vec<String> {
                vec![SHARPE_RATIO.to_string()]
            }
        }

        let space = ParameterSpace::new(vec![ParameterDefinition::integer(
            "period", 10, 50, 10, 20,
        )]);
        let analyzer = SensitivityAnalyzer::new(
            Arc::new(AlwaysFailing),
            ObjectiveSpec::new(SHARPE_RATIO, true),
        );
        let results = analyzer
            .run(&space, &space.defaults(), &context())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sensitivity_score, 0.0);
        assert!(results[0].optimal_value.is_none());
        assert!(results[0].description.contains("failed"));
    }

    #[tokio::test]
    async fn test_flat_objective_scores_all_zero() {
        let space = ParameterSpace::new(vec![
            ParameterDefinition::categorical("mode", &["a", "b", "c"], "a"),
            ParameterDefinition::categorical("style", &["x", "y"], "x"),
        ]);
        let results = analyzer()
            .run(&space, &space.defaults(), &context())
            .await
            .unwrap();
        for result in &results {
            assert_eq!(result.sensitivity_score, 0.0);
        }
    }
}
