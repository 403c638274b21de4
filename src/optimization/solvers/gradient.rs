use std::ops::ControlFlow;

use super::traits::{
    Halt, Problem, SearchCallback, Strategy, StrategyResult, Termination, clamp_to_bounds, probe,
};
use crate::error::Result;

/// Finite-difference gradient descent with Armijo line search and learning
/// rate adaptation.
///
/// Steps are taken in scaled coordinates: each parameter is divided by its
/// bound range, or by its starting magnitude when unbounded, so a transistor
/// width in metres and a bias current in amperes move at comparable rates.
pub struct GradientDescent {
    max_iter: u32,
    precision: f64,
    learning_rate: f64,
    min_learning_rate: f64,
    max_learning_rate: f64,
    armijo_c: f64,         // Armijo condition parameter
    backtrack_factor: f64, // Line search backtracking
    increase_factor: f64,  // Learning rate increase when successful
    step: f64,             // Finite-difference step in scaled units
}

impl GradientDescent {
    pub fn new(max_iter: u32, precision: f64) -> Self {
        Self {
            max_iter,
            precision,
            learning_rate: 0.1,
            min_learning_rate: 1e-6,
            max_learning_rate: 1.0,
            armijo_c: 1e-4,
            backtrack_factor: 0.5,
            increase_factor: 1.2,
            step: 1e-6,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    fn scales(bounds: &[(f64, f64)], initial: &[f64]) -> Vec<f64> {
        bounds
            .iter()
            .zip(initial)
            .map(|(&(min, max), &x0)| {
                let range = max - min;
                if range.is_finite() && range > 0.0 {
                    range
                } else {
                    x0.abs().max(1.0)
                }
            })
            .collect()
    }

    /// Central-difference gradient with respect to the scaled coordinates
    fn compute_gradient(
        &self,
        problem: &dyn Problem,
        params: &[f64],
        scales: &[f64],
        grad: &mut [f64],
        cost_evals: &mut usize,
    ) -> Result<ControlFlow<Halt>> {
        let bounds = problem.bounds();

        for i in 0..params.len() {
            let h = self.step * scales[i];
            let mut p_plus = params.to_vec();
            let mut p_minus = params.to_vec();

            p_plus[i] += h;
            p_minus[i] -= h;
            clamp_to_bounds(&mut p_plus, bounds);
            clamp_to_bounds(&mut p_minus, bounds);

            let c_plus = match probe(problem, &p_plus, cost_evals)? {
                ControlFlow::Continue(cost) => cost,
                ControlFlow::Break(halt) => return Ok(ControlFlow::Break(halt)),
            };
            let c_minus = match probe(problem, &p_minus, cost_evals)? {
                ControlFlow::Continue(cost) => cost,
                ControlFlow::Break(halt) => return Ok(ControlFlow::Break(halt)),
            };

            let dx = (p_plus[i] - p_minus[i]) / scales[i];
            grad[i] = if dx > 0.0 { (c_plus - c_minus) / dx } else { 0.0 };
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Armijo line search with backtracking.
    ///
    /// Returns the accepted point and its cost. Without a sufficient decrease
    /// the best improving trial is taken, and failing that the current point.
    fn line_search(
        &self,
        problem: &dyn Problem,
        params: &[f64],
        gradient: &[f64],
        scales: &[f64],
        current_cost: f64,
        cost_evals: &mut usize,
    ) -> Result<ControlFlow<Halt, (Vec<f64>, f64)>> {
        let mut alpha = self.learning_rate;
        let grad_norm_sq: f64 = gradient.iter().map(|&g| g * g).sum();
        let mut best = (params.to_vec(), current_cost);

        for _ in 0..10 {
            let mut new_params = params.to_vec();
            for i in 0..params.len() {
                new_params[i] -= alpha * gradient[i] * scales[i];
            }
            clamp_to_bounds(&mut new_params, problem.bounds());

            let new_cost = match probe(problem, &new_params, cost_evals)? {
                ControlFlow::Continue(cost) => cost,
                ControlFlow::Break(halt) => return Ok(ControlFlow::Break(halt)),
            };

            // Armijo condition: sufficient decrease
            if new_cost <= current_cost - self.armijo_c * alpha * grad_norm_sq {
                return Ok(ControlFlow::Continue((new_params, new_cost)));
            }
            if new_cost < best.1 {
                best = (new_params, new_cost);
            }

            alpha *= self.backtrack_factor;
            if alpha < self.min_learning_rate {
                break;
            }
        }

        Ok(ControlFlow::Continue(best))
    }
}

impl Strategy for GradientDescent {
    fn name(&self) -> &str {
        "GradientDescent"
    }

    fn requires_bounds(&self) -> bool {
        false
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn SearchCallback,
    ) -> Result<StrategyResult> {
        let n = problem.num_params();
        let bounds = problem.bounds();

        let mut params = problem.initial_params().to_vec();
        clamp_to_bounds(&mut params, bounds);
        let scales = Self::scales(bounds, &params);
        let mut gradient = vec![0.0; n];

        let mut cost_evals = 0;
        let mut grad_evals = 0;
        let mut prev_cost = f64::INFINITY;
        let mut consecutive_improvements = 0;

        // Every later point comes out of the line search already evaluated
        let mut cost = match probe(problem, &params, &mut cost_evals)? {
            ControlFlow::Continue(cost) => cost,
            ControlFlow::Break(halt) => return Ok(halt.into_result(0, cost_evals, grad_evals)),
        };

        for iter in 0..self.max_iter {
            callback.on_iteration(iter + 1, &params, cost)?;

            let finish = |termination, params: Vec<f64>| {
                StrategyResult::new(termination, cost, iter + 1, params)
                    .with_evals(cost_evals, grad_evals)
            };

            if callback.should_stop() {
                return Ok(finish(Termination::StoppedByCallback, params));
            }

            if cost < self.precision {
                return Ok(finish(Termination::Converged, params));
            }

            if (prev_cost - cost).abs() < self.precision * 0.01 {
                return Ok(finish(Termination::Stagnated, params));
            }

            // Adapt learning rate based on progress
            if cost < prev_cost {
                consecutive_improvements += 1;
                if consecutive_improvements >= 3 {
                    self.learning_rate =
                        (self.learning_rate * self.increase_factor).min(self.max_learning_rate);
                }
            } else {
                consecutive_improvements = 0;
            }

            prev_cost = cost;

            if let ControlFlow::Break(halt) =
                self.compute_gradient(problem, &params, &scales, &mut gradient, &mut cost_evals)?
            {
                return Ok(halt.into_result(iter + 1, cost_evals, grad_evals));
            }
            grad_evals += 1;

            (params, cost) = match self.line_search(
                problem,
                &params,
                &gradient,
                &scales,
                cost,
                &mut cost_evals,
            )? {
                ControlFlow::Continue(accepted) => accepted,
                ControlFlow::Break(halt) => {
                    return Ok(halt.into_result(iter + 1, cost_evals, grad_evals));
                }
            };
        }

        Ok(
            StrategyResult::new(Termination::MaxIterations, cost, self.max_iter, params)
                .with_evals(cost_evals, grad_evals),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::optimization::solvers::Evaluation;

    /// `(x - 0.8)²` on `[0, 1]`, remembering every point it was asked about.
    struct Bowl {
        points: RefCell<Vec<f64>>,
        bounds: Vec<(f64, f64)>,
        initial: Vec<f64>,
    }

    impl Bowl {
        fn new() -> Self {
            Self {
                points: RefCell::new(Vec::new()),
                bounds: vec![(0.0, 1.0)],
                initial: vec![0.0],
            }
        }

        fn loss(x: f64) -> f64 {
            (x - 0.8).powi(2)
        }
    }

    impl Problem for Bowl {
        fn evaluate(&self, params: &[f64]) -> Result<Evaluation> {
            self.points.borrow_mut().push(params[0]);
            Ok(Evaluation::Continue(Self::loss(params[0])))
        }

        fn num_params(&self) -> usize {
            1
        }

        fn initial_params(&self) -> &[f64] {
            &self.initial
        }

        fn bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }
    }

    struct Quiet;

    impl SearchCallback for Quiet {
        fn on_iteration(&mut self, _: u32, _: &[f64], _: f64) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn accepted_step_is_not_evaluated_twice() {
        let problem = Bowl::new();
        let result = GradientDescent::new(2, 1e-12)
            .solve(&problem, &mut Quiet)
            .unwrap();

        // Start, then two central differences and one accepted step per iteration
        assert_eq!(result.cost_evals, 7);
        assert_eq!(problem.points.borrow().len(), 7);
        assert_eq!(result.termination, Termination::MaxIterations);

        let points = problem.points.borrow();
        let x = result.params[0];
        assert_eq!(points.iter().filter(|&&p| p == x).count(), 1);
        assert_eq!(result.cost, Bowl::loss(x));
        assert!(result.cost < Bowl::loss(0.0));
    }

    #[test]
    fn reported_cost_belongs_to_the_returned_point() {
        let problem = Bowl::new();
        let mut gd = GradientDescent::new(50, 1e-12);
        let result = gd.solve(&problem, &mut Quiet).unwrap();

        approx::assert_relative_eq!(result.params[0], 0.8, epsilon = 1e-3);
        assert_eq!(result.cost, Bowl::loss(result.params[0]));
        assert_eq!(result.cost_evals, problem.points.borrow().len());
    }
}
