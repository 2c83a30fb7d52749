//! Exhaustive grid search.

use super::SearchStrategy;
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{ParameterAssignment, ParameterSpace};
use crate::domain::types::EvaluatedCandidate;
use tracing::info;

/// Proposes every point of the full cartesian grid exactly once, in the
/// deterministic order defined by the parameter space, then signals done.
/// The iteration budget only ever cuts the run short; it never reorders it.
pub struct GridSearch {
    remaining: std::vec::IntoIter<ParameterAssignment>,
    total: usize,
    exhausted: bool,
}

impl GridSearch {
    pub fn new(space: &ParameterSpace) -> Self {
        let grid = space.grid();
        let total = grid.len();
        Self {
            remaining: grid.into_iter(),
            total,
            exhausted: false,
        }
    }
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn next_batch(
        &mut self,
        _history: &[EvaluatedCandidate],
    ) -> Result<Vec<ParameterAssignment>, OptimizeError> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        self.exhausted = true;
        let batch: Vec<ParameterAssignment> = self.remaining.by_ref().collect();
        info!("GridSearch: proposing all {} grid points", self.total);
        Ok(batch)
    }
}
