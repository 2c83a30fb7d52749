//! Bayesian optimization with a kernel-regression surrogate and an
//! expected-improvement acquisition.
//!
//! The surrogate is a Gaussian-kernel (RBF) regression over normalized
//! parameter coordinates: cheap to fit on every observation set, no linear
//! algebra, and well behaved on the small observation counts a backtest
//! budget allows. Proposals maximize expected improvement over the incumbent
//! across a random candidate pool.

use super::{ObjectiveSpec, SearchStrategy, decode, encode};
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{ParameterAssignment, ParameterSpace};
use crate::domain::types::EvaluatedCandidate;
use rand::rngs::StdRng;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::debug;

pub struct BayesianSearch {
    space: ParameterSpace,
    objective: ObjectiveSpec,
    budget: usize,
    initial_samples: usize,
    exploration_factor: f64,
    length_scale: f64,
    noise_variance: f64,
    candidate_pool: usize,
    proposed: usize,
    seeded: bool,
    rng: StdRng,
}

impl BayesianSearch {
    pub fn new(
        space: &ParameterSpace,
        objective: ObjectiveSpec,
        params: &super::AlgorithmParams,
        budget: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            space: space.clone(),
            objective,
            budget,
            initial_samples: params.initial_samples.max(1),
            exploration_factor: params.exploration_factor,
            length_scale: params.length_scale.max(1e-3),
            noise_variance: params.noise_variance.max(0.0),
            candidate_pool: params.candidate_pool.max(8),
            proposed: 0,
            seeded: false,
            rng,
        }
    }

    /// Kernel-weighted posterior mean and standard deviation at `x`.
    fn surrogate(&self, x: &[f64], observations: &[(Vec<f64>, f64)]) -> (f64, f64) {
        let bandwidth = 2.0 * self.length_scale * self.length_scale;
        let mut weight_sum = 0.0;
        let mut mean = 0.0;
        for (coords, score) in observations {
            let d2: f64 = x
                .iter()
                .zip(coords.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            let w = (-d2 / bandwidth).exp();
            weight_sum += w;
            mean += w * score;
        }

        if weight_sum < 1e-12 {
            // Far from every observation: fall back to the sample statistics
            // with maximal uncertainty.
            let n = observations.len() as f64;
            let mu = observations.iter().map(|(_, s)| s).sum::<f64>() / n;
            let var = observations
                .iter()
                .map(|(_, s)| (s - mu) * (s - mu))
                .sum::<f64>()
                / n;
            return (mu, (var + self.noise_variance).sqrt().max(1e-6));
        }

        mean /= weight_sum;
        let mut var = 0.0;
        for (coords, score) in observations {
            let d2: f64 = x
                .iter()
                .zip(coords.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            let w = (-d2 / bandwidth).exp();
            var += w * (score - mean) * (score - mean);
        }
        var /= weight_sum;
        // Distance from the data inflates uncertainty: a point sitting on an
        // observation keeps almost none, an isolated one keeps the full
        // sample spread.
        let coverage = (weight_sum / observations.len() as f64).clamp(0.0, 1.0);
        let sigma = ((var + self.noise_variance) * (1.0 - coverage) + self.noise_variance)
            .sqrt()
            .max(1e-9);
        (mean, sigma)
    }

    /// Expected improvement of a point with posterior `(mu, sigma)` over the
    /// incumbent best score.
    fn expected_improvement(&self, mu: f64, sigma: f64, best: f64) -> f64 {
        let improvement = mu - best - self.exploration_factor;
        if sigma < 1e-12 {
            return improvement.max(0.0);
        }
        let z = improvement / sigma;
        let normal = Normal::standard();
        improvement * normal.cdf(z) + sigma * normal.pdf(z)
    }
}

impl SearchStrategy for BayesianSearch {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn next_batch(
        &mut self,
        history: &[EvaluatedCandidate],
    ) -> Result<Vec<ParameterAssignment>, OptimizeError> {
        if self.proposed >= self.budget {
            return Ok(Vec::new());
        }

        // Seed batch: the defaults plus random points, so the first model fit
        // has at least one observation to anchor on.
        if !self.seeded {
            self.seeded = true;
            let mut batch = vec![self.space.defaults()];
            while batch.len() < self.initial_samples && batch.len() < self.budget {
                batch.push(self.space.random_assignment(&mut self.rng));
            }
            batch.truncate(self.budget);
            self.proposed += batch.len();
            return Ok(batch);
        }

        let observations: Vec<(Vec<f64>, f64)> = history
            .iter()
            .filter_map(|c| {
                self.objective
                    .score(&c.outcome)
                    .map(|s| (encode(&self.space, &c.assignment), s))
            })
            .collect();

        let proposal = if observations.is_empty() {
            // Every seed failed; keep exploring blindly.
            self.space.random_assignment(&mut self.rng)
        } else {
            let best = observations
                .iter()
                .map(|(_, s)| *s)
                .fold(f64::NEG_INFINITY, f64::max);

            let mut best_candidate = None;
            let mut best_ei = f64::NEG_INFINITY;
            for _ in 0..self.candidate_pool {
                let candidate = self.space.random_assignment(&mut self.rng);
                let coords = encode(&self.space, &candidate);
                let (mu, sigma) = self.surrogate(&coords, &observations);
                let ei = self.expected_improvement(mu, sigma, best);
                if ei > best_ei {
                    best_ei = ei;
                    best_candidate = Some(coords);
                }
            }
            debug!(
                "BayesianSearch: proposal {}/{} with EI {:.6}",
                self.proposed + 1,
                self.budget,
                best_ei
            );
            match best_candidate {
                Some(coords) => decode(&self.space, &coords),
                None => self.space.random_assignment(&mut self.rng),
            }
        };

        self.proposed += 1;
        Ok(vec![self.space.clamp(&proposal)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{EvaluationOutcome, Metrics, SHARPE_RATIO};
    use crate::domain::parameters::{ParameterDefinition, ParameterValue};
    use rand::SeedableRng;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![ParameterDefinition::integer("period", 0, 100, 1, 50)])
    }

    fn evaluate(assignment: &ParameterAssignment) -> EvaluatedCandidate {
        // Smooth unimodal objective peaking at period = 70
        let p = match assignment.get("period") {
            Some(ParameterValue::Integer(v)) => *v as f64,
            _ => 0.0,
        };
        let value = 2.0 - ((p - 70.0) / 100.0).powi(2);
        EvaluatedCandidate {
            assignment: assignment.clone(),
            outcome: EvaluationOutcome::success(Metrics::new().with(SHARPE_RATIO, value)),
            rank: None,
        }
    }

    fn run(budget: usize) -> Vec<EvaluatedCandidate> {
        let space = space();
        let mut search = BayesianSearch::new(
            &space,
            ObjectiveSpec::new(SHARPE_RATIO, true),
            &super::super::AlgorithmParams::default(),
            budget,
            StdRng::seed_from_u64(42),
        );
        let mut history = Vec::new();
        loop {
            let batch = search.next_batch(&history).unwrap();
            if batch.is_empty() {
                break;
            }
            for assignment in &batch {
                assert!(space.validate_assignment(assignment).is_ok());
                history.push(evaluate(assignment));
            }
        }
        history
    }

    #[test]
    fn test_bayesian_respects_budget_and_domain() {
        let history = run(20);
        assert_eq!(history.len(), 20);
    }

    #[test]
    fn test_bayesian_first_batch_includes_defaults() {
        let space = space();
        let mut search = BayesianSearch::new(
            &space,
            ObjectiveSpec::new(SHARPE_RATIO, true),
            &super::super::AlgorithmParams::default(),
            20,
            StdRng::seed_from_u64(1),
        );
        let seed = search.next_batch(&[]).unwrap();
        assert_eq!(seed[0], space.defaults());
        assert_eq!(seed.len(), 5);
    }

    #[test]
    fn test_bayesian_outperforms_seed_average() {
        let history = run(30);
        let best = history
            .iter()
            .filter_map(|c| c.outcome.objective(SHARPE_RATIO))
            .fold(f64::NEG_INFINITY, f64::max);
        // The optimum is 2.0 at period 70; the search must land near it.
        assert!(best > 1.95, "best found {} too far from optimum", best);
    }

    #[test]
    fn test_bayesian_survives_all_failed_seeds() {
        let space = space();
        let mut search = BayesianSearch::new(
            &space,
            ObjectiveSpec::new(SHARPE_RATIO, true),
            &super::super::AlgorithmParams::default(),
            10,
            StdRng::seed_from_u64(9),
        );
        let seed = search.next_batch(&[]).unwrap();
        let history: Vec<EvaluatedCandidate> = seed
            .iter()
            .map(|a| EvaluatedCandidate {
                assignment: a.clone(),
                outcome: EvaluationOutcome::failure("boom"),
                rank: None,
            })
            .collect();
        let next = search.next_batch(&history).unwrap();
        assert_eq!(next.len(), 1);
        assert!(space.validate_assignment(&next[0]).is_ok());
    }
}
