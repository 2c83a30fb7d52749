//! Uniform random search.

use super::SearchStrategy;
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{ParameterAssignment, ParameterSpace};
use crate::domain::types::EvaluatedCandidate;
use rand::rngs::StdRng;
use tracing::info;

/// Draws `iteration_budget` independent uniform samples from the discretized
/// parameter space. Samples are independent: duplicates are possible and
/// deliberate.
pub struct RandomSearch {
    space: ParameterSpace,
    budget: usize,
    rng: StdRng,
    done: bool,
}

impl RandomSearch {
    pub fn new(space: &ParameterSpace, budget: usize, rng: StdRng) -> Self {
        Self {
            space: space.clone(),
            budget,
            rng,
            done: false,
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_batch(
        &mut self,
        _history: &[EvaluatedCandidate],
    ) -> Result<Vec<ParameterAssignment>, OptimizeError> {
        if self.done {
            return Ok(Vec::new());
        }
        self.done = true;
        let batch: Vec<ParameterAssignment> = (0..self.budget)
            .map(|_| self.space.random_assignment(&mut self.rng))
            .collect();
        info!("RandomSearch: proposing {} uniform samples", batch.len());
        Ok(batch)
    }
}
