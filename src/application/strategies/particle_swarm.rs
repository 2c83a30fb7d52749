//! Particle swarm optimization over the normalized parameter space.
//!
//! Particles live in the unit hypercube; positions are decoded onto the
//! discretized domain before evaluation, so the evaluator only ever sees
//! valid assignments. One velocity/position update is one batch.

use super::{ObjectiveSpec, SearchStrategy, decode, encode};
use crate::domain::errors::OptimizeError;
use crate::domain::parameters::{ParameterAssignment, ParameterSpace};
use crate::domain::types::EvaluatedCandidate;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

const MAX_VELOCITY: f64 = 0.5;

struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_score: f64,
}

pub struct ParticleSwarmSearch {
    space: ParameterSpace,
    objective: ObjectiveSpec,
    inertia: f64,
    cognitive: f64,
    social: f64,
    swarm_size: usize,
    particles: Vec<Particle>,
    global_best: Option<(Vec<f64>, f64)>,
    budget: usize,
    proposed: usize,
    batch_start: usize,
    initialized: bool,
    rng: StdRng,
}

impl ParticleSwarmSearch {
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
            inertia: params.inertia,
            cognitive: params.cognitive,
            social: params.social,
            swarm_size: params.swarm_size.max(2),
            particles: Vec::new(),
            global_best: None,
            budget,
            proposed: 0,
            batch_start: 0,
            initialized: false,
            rng,
        }
    }

    /// Feeds the previous step's outcomes back into personal and global
    /// bests. Batch order equals particle order; a truncated batch simply
    /// leaves the tail particles unscored this step.
    fn absorb(&mut self, evaluated: &[EvaluatedCandidate]) {
        for (particle, candidate) in self.particles.iter_mut().zip(evaluated.iter()) {
            if let Some(score) = self.objective.score(&candidate.outcome) {
                if score > particle.best_score {
                    particle.best_score = score;
                    particle.best_position = particle.position.clone();
                }
                let improves_global = self
                    .global_best
                    .as_ref()
                    .map(|(_, best)| score > *best)
                    .unwrap_or(true);
                if improves_global {
                    self.global_best = Some((particle.position.clone(), score));
                }
            }
        }
    }

    fn step(&mut self) {
        let global = match &self.global_best {
            Some((position, _)) => position.clone(),
            // No successful evaluation anywhere yet: drift on inertia alone.
            None => return,
        };
        for particle in &mut self.particles {
            for d in 0..particle.position.len() {
                let r1: f64 = self.rng.random();
                let r2: f64 = self.rng.random();
                let v = self.inertia * particle.velocity[d]
                    + self.cognitive * r1 * (particle.best_position[d] - particle.position[d])
                    + self.social * r2 * (global[d] - particle.position[d]);
                particle.velocity[d] = v.clamp(-MAX_VELOCITY, MAX_VELOCITY);
                particle.position[d] =
                    (particle.position[d] + particle.velocity[d]).clamp(0.0, 1.0);
            }
        }
    }
}

impl SearchStrategy for ParticleSwarmSearch {
    fn name(&self) -> &'static str {
        "particle_swarm"
    }

    fn next_batch(
        &mut self,
        history: &[EvaluatedCandidate],
    ) -> Result<Vec<ParameterAssignment>, OptimizeError> {
        if self.proposed >= self.budget {
            return Ok(Vec::new());
        }

        let dims = self.space.parameters.len();

        if !self.initialized {
            self.initialized = true;
            let swarm_size = self.swarm_size;
            // First particle starts on the defaults, the rest scatter.
            let mut positions = vec![encode(&self.space, &self.space.defaults())];
            while positions.len() < swarm_size {
                positions.push((0..dims).map(|_| self.rng.random::<f64>()).collect());
            }
            for position in positions {
                let velocity = (0..dims)
                    .map(|_| self.rng.random_range(-0.1..0.1))
                    .collect();
                self.particles.push(Particle {
                    best_position: position.clone(),
                    position,
                    velocity,
                    best_score: f64::NEG_INFINITY,
                });
            }
        } else {
            let evaluated = &history[self.batch_start..];
            self.absorb(evaluated);
            self.step();
        }

        let remaining = self.budget - self.proposed;
        let batch: Vec<ParameterAssignment> = self
            .particles
            .iter()
            .take(remaining)
            .map(|p| decode(&self.space, &p.position))
            .collect();

        debug!(
            "ParticleSwarm: step with {} particles ({} evaluations used)",
            batch.len(),
            self.proposed
        );

        self.batch_start = history.len();
        self.proposed += batch.len();
        Ok(batch)
    }
}
