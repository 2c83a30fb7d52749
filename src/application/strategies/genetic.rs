//! Genetic algorithm over the parameter space.
//!
//! Fixed-size population, elitism plus tournament selection, uniform
//! per-dimension crossover and in-domain mutation. One generation is one
//! batch; fitness for a generation is read back out of the shared history.

use super::{ObjectiveSpec, SearchStrategy};
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{ParameterAssignment, ParameterSpace};
use crate::domain::types::EvaluatedCandidate;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

pub struct GeneticSearch {
    space: ParameterSpace,
    objective: ObjectiveSpec,
    population_size: usize,
    generations: usize,
    mutation_rate: f64,
    crossover_rate: f64,
    elite_count: usize,
    tournament_size: usize,
    budget: usize,
    generation: usize,
    gen_start: usize,
    proposed: usize,
    rng: StdRng,
}

impl GeneticSearch {
    pub fn new(
        space: &ParameterSpace,
        objective: ObjectiveSpec,
        params: &super::AlgorithmParams,
        budget: usize,
        rng: StdRng,
    ) -> Self {
        let population_size = params.population_size.max(2);
        Self {
            space: space.clone(),
            objective,
            population_size,
            generations: params.generations.max(1),
            mutation_rate: params.mutation_rate.clamp(0.0, 1.0),
            crossover_rate: params.crossover_rate.clamp(0.0, 1.0),
            elite_count: params.elite_count.min(population_size),
            tournament_size: params.tournament_size.max(1),
            budget,
            generation: 0,
            gen_start: 0,
            proposed: 0,
            rng,
        }
    }

    /// Fitness of the previous generation, in discovery order. Failed
    /// evaluations are kept as worst-possible fitness so indices stay
    /// aligned with the population.
    fn fitness(&self, generation: &[EvaluatedCandidate]) -> Vec<f64> {
        generation
            .iter()
            .map(|c| self.objective.score(&c.outcome).unwrap_or(f64::NEG_INFINITY))
            .collect()
    }

    /// Tournament selection. Ties favor the earlier-discovered individual:
    /// strictly-greater comparison keeps the lowest index on equal fitness.
    fn select<'a>(
        &mut self,
        generation: &'a [EvaluatedCandidate],
        fitness: &[f64],
    ) -> &'a ParameterAssignment {
        let mut winner = self.rng.random_range(0..generation.len());
        for _ in 1..self.tournament_size {
            let challenger = self.rng.random_range(0..generation.len());
            if fitness[challenger] > fitness[winner]
                || (fitness[challenger] == fitness[winner] && challenger < winner)
            {
                winner = challenger;
            }
        }
        &generation[winner].assignment
    }

    /// Uniform crossover across parameter dimensions followed by
    /// per-parameter mutation within domain bounds.
    fn breed(
        &mut self,
        parent_a: &ParameterAssignment,
        parent_b: &ParameterAssignment,
    ) -> ParameterAssignment {
        let mut child = ParameterAssignment::new();
        let cross = self.rng.random::<f64>() < self.crossover_rate;
        let definitions = self.space.parameters.clone();
        for def in &definitions {
            let from_b = cross && self.rng.random::<f64>() < 0.5;
            let source = if from_b { parent_b } else { parent_a };
            let mut value = source
                .get(&def.name)
                .cloned()
                .unwrap_or_else(|| def.default_value());
            if self.rng.random::<f64>() < self.mutation_rate {
                value = def.sample(&mut self.rng);
            }
            child.set(&def.name, value);
        }
        self.space.clamp(&child)
    }
}

impl SearchStrategy for GeneticSearch {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn next_batch(
        &mut self,
        history: &[EvaluatedCandidate],
    ) -> Result<Vec<ParameterAssignment>, OptimizeError> {
        if self.generation >= self.generations || self.proposed >= self.budget {
            return Ok(Vec::new());
        }

        // Generation zero: the defaults plus random fill.
        if self.generation == 0 {
            let mut population = vec![self.space.defaults()];
            while population.len() < self.population_size {
                population.push(self.space.random_assignment(&mut self.rng));
            }
            population.truncate(self.budget);
            self.generation = 1;
            self.gen_start = history.len();
            self.proposed += population.len();
            return Ok(population);
        }

        let previous = &history[self.gen_start..];
        if previous.is_empty() {
            return Ok(Vec::new());
        }
        let fitness = self.fitness(previous);

        // Elites survive unchanged; ties favor earlier discovery through the
        // stable sort.
        let mut order: Vec<usize> = (0..previous.len()).collect();
        order.sort_by(|&a, &b| {
            fitness[b]
                .partial_cmp(&fitness[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut next: Vec<ParameterAssignment> = order
            .iter()
            .take(self.elite_count)
            .map(|&i| previous[i].assignment.clone())
            .collect();

        while next.len() < self.population_size {
            let parent_a = self.select(previous, &fitness).clone();
            let parent_b = self.select(previous, &fitness).clone();
            next.push(self.breed(&parent_a, &parent_b));
        }

        let remaining = self.budget.saturating_sub(self.proposed);
        next.truncate(remaining);

        debug!(
            "GeneticSearch: generation {}/{} with {} individuals",
            self.generation + 1,
            self.generations,
            next.len()
        );

        self.generation += 1;
        self.gen_start = history.len();
        self.proposed += next.len();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{EvaluationOutcome, Metrics, SHARPE_RATIO};
    use crate::domain::parameters::{ParameterDefinition, ParameterValue};
    use rand::SeedableRng;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterDefinition::integer("fast", 5, 50, 5, 10),
            ParameterDefinition::integer("slow", 20, 200, 20, 100),
        ])
    }

    fn evaluate(assignment: &ParameterAssignment) -> EvaluatedCandidate {
        let fast = match assignment.get("fast") {
            Some(ParameterValue::Integer(v)) => *v as f64,
            _ => 0.0,
        };
        // Fitness favors large fast periods
        EvaluatedCandidate {
            assignment: assignment.clone(),
            outcome: EvaluationOutcome::success(Metrics::new().with(SHARPE_RATIO, fast / 50.0)),
            rank: None,
        }
    }

    #[test]
    fn test_genetic_runs_generations_within_domain() {
        let space = space();
        let params = super::super::AlgorithmParams {
            population_size: 10,
            generations: 5,
            ..Default::default()
        };
        let mut search = GeneticSearch::new(
            &space,
            ObjectiveSpec::new(SHARPE_RATIO, true),
            &params,
            1000,
            StdRng::seed_from_u64(21),
        );

        let mut history = Vec::new();
        let mut batches = 0;
        loop {
            let batch = search.next_batch(&history).unwrap();
            if batch.is_empty() {
                break;
            }
            batches += 1;
            assert!(batch.len() <= 10);
            for assignment in &batch {
                assert!(space.validate_assignment(assignment).is_ok());
                history.push(evaluate(assignment));
            }
        }
        assert_eq!(batches, 5);
        assert_eq!(history.len(), 50);
    }

    #[test]
    fn test_genetic_iteration_budget_binds_before_generations() {
        let space = space();
        let params = super::super::AlgorithmParams {
            population_size: 10,
            generations: 100,
            ..Default::default()
        };
        let mut search = GeneticSearch::new(
            &space,
            ObjectiveSpec::new(SHARPE_RATIO, true),
            &params,
            25,
            StdRng::seed_from_u64(4),
        );

        let mut history = Vec::new();
        loop {
            let batch = search.next_batch(&history).unwrap();
            if batch.is_empty() {
                break;
            }
            for assignment in &batch {
                history.push(evaluate(assignment));
            }
        }
        assert_eq!(history.len(), 25);
    }

    #[test]
    fn test_genetic_improves_on_simple_fitness() {
        let space = space();
        let params = super::super::AlgorithmParams {
            population_size: 12,
            generations: 10,
            ..Default::default()
        };
        let mut search = GeneticSearch::new(
            &space,
            ObjectiveSpec::new(SHARPE_RATIO, true),
            &params,
            1000,
            StdRng::seed_from_u64(77),
        );

        let mut history: Vec<EvaluatedCandidate> = Vec::new();
        loop {
            let batch = search.next_batch(&history).unwrap();
            if batch.is_empty() {
                break;
            }
            for assignment in &batch {
                history.push(evaluate(assignment));
            }
        }

        let last_gen_best = history[history.len() - 12..]
            .iter()
            .filter_map(|c| c.outcome.objective(SHARPE_RATIO))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(last_gen_best, 1.0, "selection pressure should reach fast=50");
    }
}
