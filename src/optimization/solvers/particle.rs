use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::{
    Problem, SearchCallback, Strategy, StrategyResult, Termination, clamp_to_bounds, probe,
};
use crate::error::Result;

/// Particle Swarm Optimization - often outperforms gradient-based methods
/// for noisy, non-convex problems with fewer cost evaluations
pub struct ParticleSwarm {
    max_iter: u32,
    precision: f64,
    population_size: usize,
    inertia: f64,   // w - velocity inertia weight
    cognitive: f64, // c1 - personal best influence
    social: f64,    // c2 - global best influence
    seed: Option<u64>,
}

impl ParticleSwarm {
    pub fn new(max_iter: u32, precision: f64) -> Self {
        Self {
            max_iter,
            precision,
            population_size: 20,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
            seed: None,
        }
    }

    /// Configure swarm size (default: 20)
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(1);
        self
    }

    /// Configure PSO parameters (defaults: w=0.7, c1=1.5, c2=1.5)
    pub fn with_pso_params(mut self, inertia: f64, cognitive: f64, social: f64) -> Self {
        self.inertia = inertia;
        self.cognitive = cognitive;
        self.social = social;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Initialize particle positions uniformly within bounds
    fn initialize_particles(
        &self,
        rng: &mut StdRng,
        bounds: &[(f64, f64)],
        initial_params: &[f64],
    ) -> Vec<Vec<f64>> {
        let mut particles = Vec::with_capacity(self.population_size);

        // First particle is the provided initial guess
        let mut first = initial_params.to_vec();
        clamp_to_bounds(&mut first, bounds);
        particles.push(first);

        for _ in 1..self.population_size {
            particles.push(bounds.iter().map(|&(min, max)| rng.gen_range(min..=max)).collect());
        }

        particles
    }

    /// Initialize velocities (small random values)
    fn initialize_velocities(&self, rng: &mut StdRng, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        (0..self.population_size)
            .map(|_| {
                bounds
                    .iter()
                    .map(|&(min, max)| {
                        let range = (max - min) * 0.1;
                        rng.gen_range(-range..=range)
                    })
                    .collect()
            })
            .collect()
    }
}

impl Strategy for ParticleSwarm {
    fn name(&self) -> &str {
        "PSO"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn SearchCallback,
    ) -> Result<StrategyResult> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Initialize swarm
        let mut particles = self.initialize_particles(&mut rng, bounds, problem.initial_params());
        let mut velocities = self.initialize_velocities(&mut rng, bounds);
        let mut personal_best_positions = particles.clone();
        let mut personal_best_costs = vec![f64::INFINITY; self.population_size];

        let mut global_best_idx = 0;
        let mut global_best_cost = f64::INFINITY;

        let mut cost_evals = 0;
        let mut stagnation_counter = 0;
        const MAX_STAGNATION: u32 = 5;

        for iter in 0..self.max_iter {
            let prev_global_best = global_best_cost;

            // Evaluate all particles
            for p in 0..self.population_size {
                clamp_to_bounds(&mut particles[p], bounds);

                let cost = match probe(problem, &particles[p], &mut cost_evals)? {
                    ControlFlow::Continue(cost) => cost,
                    ControlFlow::Break(halt) => return Ok(halt.into_result(iter + 1, cost_evals, 0)),
                };

                if cost < personal_best_costs[p] {
                    personal_best_costs[p] = cost;
                    personal_best_positions[p].copy_from_slice(&particles[p]);
                }

                if cost < global_best_cost {
                    global_best_cost = cost;
                    global_best_idx = p;
                }
            }

            let best = &personal_best_positions[global_best_idx];
            callback.on_iteration(iter + 1, best, global_best_cost)?;

            let finish = |termination| {
                StrategyResult::new(termination, global_best_cost, iter + 1, best.clone())
                    .with_evals(cost_evals, 0)
            };

            if callback.should_stop() {
                return Ok(finish(Termination::StoppedByCallback));
            }

            if global_best_cost < self.precision {
                return Ok(finish(Termination::Converged));
            }

            if (prev_global_best - global_best_cost).abs() < self.precision * 0.01 {
                stagnation_counter += 1;
                if stagnation_counter >= MAX_STAGNATION {
                    return Ok(finish(Termination::Stagnated));
                }
            } else {
                stagnation_counter = 0;
            }

            // Update velocities and positions for all particles
            let global_best = personal_best_positions[global_best_idx].clone();
            for p in 0..self.population_size {
                for i in 0..n {
                    let r1: f64 = rng.gen_range(0.0..1.0);
                    let r2: f64 = rng.gen_range(0.0..1.0);

                    velocities[p][i] = self.inertia * velocities[p][i]
                        + self.cognitive * r1 * (personal_best_positions[p][i] - particles[p][i])
                        + self.social * r2 * (global_best[i] - particles[p][i]);

                    // Clamp velocity to fraction of search space
                    let (min, max) = bounds[i];
                    let v_max = (max - min) * 0.2;
                    velocities[p][i] = velocities[p][i].clamp(-v_max, v_max);

                    particles[p][i] += velocities[p][i];
                }

                clamp_to_bounds(&mut particles[p], bounds);
            }
        }

        Ok(StrategyResult::new(
            Termination::MaxIterations,
            global_best_cost,
            self.max_iter,
            personal_best_positions[global_best_idx].clone(),
        )
        .with_evals(cost_evals, 0))
    }
}
