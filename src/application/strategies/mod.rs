//! Pluggable search strategies.
//!
//! Every algorithm sits behind [`SearchStrategy`]: the orchestrator asks for
//! the next batch of candidate assignments and feeds back the evaluation
//! history. One batch is one synchronization barrier, which is how the
//! population-based algorithms get their generation semantics while grid and
//! random runs stay embarrassingly parallel.

mod bayesian;
mod genetic;
mod grid;
mod particle_swarm;
mod random;

pub use bayesian::BayesianSearch;
pub use genetic::GeneticSearch;
pub use grid::GridSearch;
pub use particle_swarm::ParticleSwarmSearch;
pub use random::RandomSearch;

use crate::domain::errors::OptimizeError;
use crate::domain::metrics::EvaluationOutcome;
use crate::domain::parameters::{
    ParameterAssignment, ParameterDomain, ParameterSpace, ParameterValue,
};
use crate::domain::types::EvaluatedCandidate;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A search algorithm proposing candidate assignments.
///
/// An empty batch signals that the strategy is done. Strategies never hand
/// out an out-of-domain assignment; proposals are clamped before they leave.
pub trait SearchStrategy: Send {
    fn name(&self) -> &'static str;

    /// Proposes the next batch of assignments given everything evaluated so
    /// far. The orchestrator evaluates the whole batch before calling again.
    fn next_batch(
        &mut self,
        history: &[EvaluatedCandidate],
    ) -> Result<Vec<ParameterAssignment>, OptimizeError>;
}

/// The closed set of supported search algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Grid,
    Random,
    Bayesian,
    Genetic,
    ParticleSwarm,
}

impl FromStr for Algorithm {
    type Err = OptimizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grid" => Ok(Algorithm::Grid),
            "random" => Ok(Algorithm::Random),
            "bayesian" => Ok(Algorithm::Bayesian),
            "genetic" => Ok(Algorithm::Genetic),
            "pso" | "particle_swarm" | "particleswarm" => Ok(Algorithm::ParticleSwarm),
            _ => Err(OptimizeError::InvalidConfig {
                reason: format!(
                    "unknown algorithm '{}'; expected grid, random, bayesian, genetic or particle_swarm",
                    s
                ),
            }),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Algorithm::Grid => "grid",
            Algorithm::Random => "random",
            Algorithm::Bayesian => "bayesian",
            Algorithm::Genetic => "genetic",
            Algorithm::ParticleSwarm => "particle_swarm",
        };
        write!(f, "{}", name)
    }
}

/// Per-algorithm tuning knobs. Fields an algorithm does not need are ignored
/// by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmParams {
    // Genetic
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elite_count: usize,
    pub tournament_size: usize,
    // Bayesian
    pub initial_samples: usize,
    pub exploration_factor: f64,
    pub length_scale: f64,
    pub noise_variance: f64,
    pub candidate_pool: usize,
    // Particle swarm
    pub swarm_size: usize,
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        Self {
            population_size: 24,
            generations: 15,
            mutation_rate: 0.15,
            crossover_rate: 0.8,
            elite_count: 2,
            tournament_size: 3,
            initial_samples: 5,
            exploration_factor: 0.01,
            length_scale: 0.25,
            noise_variance: 1e-6,
            candidate_pool: 64,
            swarm_size: 16,
            inertia: 0.72,
            cognitive: 1.49,
            social: 1.49,
        }
    }
}

/// The objective a run searches on: one metric key and a direction.
///
/// `score` normalizes the direction so every strategy can treat higher as
/// better; failed or non-finite outcomes score `None`.
#[derive(Debug, Clone)]
pub struct ObjectiveSpec {
    pub metric: String,
    pub maximize: bool,
}

impl ObjectiveSpec {
    pub fn new(metric: &str, maximize: bool) -> Self {
        Self {
            metric: metric.to_string(),
            maximize,
        }
    }

    pub fn score(&self, outcome: &EvaluationOutcome) -> Option<f64> {
        outcome
            .objective(&self.metric)
            .map(|v| if self.maximize { v } else { -v })
    }

    /// Undoes the direction normalization for reporting.
    pub fn raw_value(&self, score: f64) -> f64 {
        if self.maximize { score } else { -score }
    }
}

/// Builds the selected strategy. Called once at orchestrator construction so
/// the search loop carries no per-algorithm branching.
pub fn build_strategy(
    algorithm: Algorithm,
    space: &ParameterSpace,
    objective: &ObjectiveSpec,
    params: &AlgorithmParams,
    iteration_budget: usize,
    rng: StdRng,
) -> Box<dyn SearchStrategy> {
    match algorithm {
        Algorithm::Grid => Box::new(GridSearch::new(space)),
        Algorithm::Random => Box::new(RandomSearch::new(space, iteration_budget, rng)),
        Algorithm::Bayesian => Box::new(BayesianSearch::new(
            space,
            objective.clone(),
            params,
            iteration_budget,
            rng,
        )),
        Algorithm::Genetic => Box::new(GeneticSearch::new(
            space,
            objective.clone(),
            params,
            iteration_budget,
            rng,
        )),
        Algorithm::ParticleSwarm => Box::new(ParticleSwarmSearch::new(
            space,
            objective.clone(),
            params,
            iteration_budget,
            rng,
        )),
    }
}

/// Encodes an assignment as coordinates in the unit hypercube, one dimension
/// per parameter in declaration order. Used by the surrogate model and the
/// swarm, which both need a continuous view of the space.
pub(crate) fn encode(space: &ParameterSpace, assignment: &ParameterAssignment) -> Vec<f64> {
    space
        .parameters
        .iter()
        .map(|def| match &def.domain {
            ParameterDomain::Integer { min, max, .. } => {
                let v = assignment
                    .get(&def.name)
                    .and_then(|v| v.as_f64())
                    .unwrap_or(*min as f64);
                if max == min {
                    0.0
                } else {
                    (v - *min as f64) / (*max - *min) as f64
                }
            }
            ParameterDomain::Float { min, max, .. } => {
                let v = assignment
                    .get(&def.name)
                    .and_then(|v| v.as_f64())
                    .unwrap_or(*min);
                if (max - min).abs() < f64::EPSILON {
                    0.0
                } else {
                    (v - min) / (max - min)
                }
            }
            ParameterDomain::Categorical { allowed, .. } => {
                let idx = match assignment.get(&def.name) {
                    Some(ParameterValue::Categorical(v)) => {
                        allowed.iter().position(|a| a == v).unwrap_or(0)
                    }
                    _ => 0,
                };
                if allowed.len() <= 1 {
                    0.0
                } else {
                    idx as f64 / (allowed.len() - 1) as f64
                }
            }
        })
        .collect()
}

/// Decodes unit-hypercube coordinates back to a valid assignment, snapping
/// numeric values onto the step lattice and categorical coordinates to the
/// nearest allowed value.
pub(crate) fn decode(space: &ParameterSpace, coords: &[f64]) -> ParameterAssignment {
    let mut assignment = ParameterAssignment::new();
    for (def, &x) in space.parameters.iter().zip(coords.iter()) {
        let x = x.clamp(0.0, 1.0);
        let value = match &def.domain {
            ParameterDomain::Integer { min, max, .. } => {
                def.clamp(&ParameterValue::Float(*min as f64 + x * (*max - *min) as f64))
            }
            ParameterDomain::Float { min, max, .. } => {
                def.clamp(&ParameterValue::Float(min + x * (max - min)))
            }
            ParameterDomain::Categorical { allowed, .. } => {
                let idx = (x * (allowed.len() - 1) as f64).round() as usize;
                ParameterValue::Categorical(allowed[idx.min(allowed.len() - 1)].clone())
            }
        };
        assignment.set(&def.name, value);
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameters::ParameterDefinition;
    use rand::SeedableRng;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterDefinition::integer("lookback", 5, 15, 5, 10),
            ParameterDefinition::float("threshold", 1.0, 2.0, 1.0, 1.0),
            ParameterDefinition::categorical("mode", &["fast", "slow"], "fast"),
        ])
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("grid".parse::<Algorithm>().unwrap(), Algorithm::Grid);
        assert_eq!("PSO".parse::<Algorithm>().unwrap(), Algorithm::ParticleSwarm);
        assert!("annealing".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_encode_decode_round_trip_on_lattice() {
        let space = space();
        let defaults = space.defaults();
        let coords = encode(&space, &defaults);
        let decoded = decode(&space, &coords);
        assert_eq!(decoded, defaults);
    }

    #[test]
    fn test_decode_always_in_domain() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(3);
        use rand::Rng;
        for _ in 0..100 {
            let coords: Vec<f64> = (0..3).map(|_| rng.random_range(-0.5..1.5)).collect();
            let decoded = decode(&space, &coords);
            assert!(space.validate_assignment(&decoded).is_ok());
        }
    }

    #[test]
    fn test_objective_spec_direction() {
        use crate::domain::metrics::{EvaluationOutcome, Metrics};
        let outcome = EvaluationOutcome::success(Metrics::new().with("max_drawdown", 12.0));

        let minimize = ObjectiveSpec::new("max_drawdown", false);
        assert_eq!(minimize.score(&outcome), Some(-12.0));
        assert_eq!(minimize.raw_value(-12.0), 12.0);

        let maximize = ObjectiveSpec::new("max_drawdown", true);
        assert_eq!(maximize.score(&outcome), Some(12.0));
    }
}
