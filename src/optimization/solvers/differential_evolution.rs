use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::traits::{
    Problem, SearchCallback, Strategy, StrategyResult, Termination, clamp_to_bounds, probe,
};
use crate::error::Result;

/// Differential evolution, `best/1/bin` scheme.
///
/// Defaults follow the common SciPy settings: population of 15 per parameter,
/// mutation factor dithered in [0.5, 1.0) once per generation, crossover
/// probability 0.7. The population has converged once the standard deviation
/// of its costs falls below `tolerance` times their mean.
pub struct DifferentialEvolution {
    max_iter: u32,
    precision: f64,
    population_size: Option<usize>,
    mutation: (f64, f64),
    crossover: f64,
    tolerance: f64,
    seed: Option<u64>,
}

impl DifferentialEvolution {
    pub fn new(max_iter: u32, precision: f64) -> Self {
        Self {
            max_iter,
            precision,
            population_size: None,
            mutation: (0.5, 1.0),
            crossover: 0.7,
            tolerance: 0.01,
            seed: None,
        }
    }

    /// Total population (default: 15 per parameter, at least 5)
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    /// Mutation factor range; equal ends disable dithering
    pub fn with_mutation(mut self, low: f64, high: f64) -> Self {
        self.mutation = (low.min(high), low.max(high));
        self
    }

    pub fn with_crossover(mut self, crossover: f64) -> Self {
        self.crossover = crossover.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn population_for(&self, n: usize) -> usize {
        self.population_size.unwrap_or(15 * n).max(5)
    }

    fn converged(&self, costs: &[f64]) -> bool {
        let count = costs.len() as f64;
        let mean = costs.iter().sum::<f64>() / count;
        let variance = costs.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / count;
        variance.sqrt() <= self.tolerance * mean.abs()
    }
}

impl Strategy for DifferentialEvolution {
    fn name(&self) -> &str {
        "DifferentialEvolution"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn SearchCallback,
    ) -> Result<StrategyResult> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let size = self.population_for(n);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // First member is the provided initial guess, the rest uniform in bounds
        let mut population = Vec::with_capacity(size);
        let mut first = problem.initial_params().to_vec();
        clamp_to_bounds(&mut first, bounds);
        population.push(first);
        for _ in 1..size {
            population.push(
                bounds
                    .iter()
                    .map(|&(min, max)| rng.gen_range(min..=max))
                    .collect::<Vec<f64>>(),
            );
        }

        let mut cost_evals = 0;
        let mut costs = Vec::with_capacity(size);
        for member in &population {
            match probe(problem, member, &mut cost_evals)? {
                ControlFlow::Continue(cost) => costs.push(cost),
                ControlFlow::Break(halt) => return Ok(halt.into_result(0, cost_evals, 0)),
            }
        }

        let mut best = costs
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i);

        for generation in 0..self.max_iter {
            let (low, high) = self.mutation;
            let factor = if high > low { rng.gen_range(low..high) } else { low };

            for target in 0..size {
                // Two distinct donors, both different from the target
                let picks = index::sample(&mut rng, size - 1, 2);
                let [r1, r2] = [picks.index(0), picks.index(1)].map(|i| if i >= target { i + 1 } else { i });

                let forced = rng.gen_range(0..n.max(1));
                let mut trial = population[target].clone();
                for j in 0..n {
                    if j == forced || rng.gen_bool(self.crossover) {
                        trial[j] = population[best][j]
                            + factor * (population[r1][j] - population[r2][j]);
                    }
                }
                clamp_to_bounds(&mut trial, bounds);

                let cost = match probe(problem, &trial, &mut cost_evals)? {
                    ControlFlow::Continue(cost) => cost,
                    ControlFlow::Break(halt) => {
                        return Ok(halt.into_result(generation + 1, cost_evals, 0));
                    }
                };

                if cost <= costs[target] {
                    population[target] = trial;
                    costs[target] = cost;
                    if cost < costs[best] {
                        best = target;
                    }
                }
            }

            callback.on_iteration(generation + 1, &population[best], costs[best])?;

            let finish = |termination| {
                StrategyResult::new(termination, costs[best], generation + 1, population[best].clone())
                    .with_evals(cost_evals, 0)
            };

            if callback.should_stop() {
                return Ok(finish(Termination::StoppedByCallback));
            }

            if costs[best] < self.precision || self.converged(&costs) {
                return Ok(finish(Termination::Converged));
            }
        }

        Ok(
            StrategyResult::new(Termination::MaxIterations, costs[best], self.max_iter, population[best].clone())
                .with_evals(cost_evals, 0),
        )
    }
}
