use std::ops::ControlFlow;

use crate::error::Result;

/// Outcome of one loss evaluation.
///
/// `Stop` means the loss reached the early-stop threshold: the strategy must
/// return immediately with [`Termination::EarlyStopped`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Continue(f64),
    Stop(f64),
}

impl Evaluation {
    pub fn loss(self) -> f64 {
        match self {
            Evaluation::Continue(loss) | Evaluation::Stop(loss) => loss,
        }
    }

    pub fn is_stop(self) -> bool {
        matches!(self, Evaluation::Stop(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    EarlyStopped,
    Stagnated,
    MaxIterations,
    StoppedByCallback,
}

impl Termination {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Termination::Converged | Termination::EarlyStopped | Termination::StoppedByCallback
        )
    }

    pub fn message(self) -> &'static str {
        match self {
            Termination::Converged => "Converged",
            Termination::EarlyStopped => "Early stop loss reached",
            Termination::Stagnated => "Stagnated",
            Termination::MaxIterations => "Max iterations reached",
            Termination::StoppedByCallback => "Stopped by callback",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StrategyResult {
    pub termination: Termination,
    pub cost: f64,
    pub iterations: u32,
    pub message: String,
    pub params: Vec<f64>,
    pub cost_evals: usize,
    pub grad_evals: usize,
}

impl StrategyResult {
    pub fn new(termination: Termination, cost: f64, iterations: u32, params: Vec<f64>) -> Self {
        Self {
            termination,
            cost,
            iterations,
            message: termination.message().into(),
            params,
            cost_evals: 0,
            grad_evals: 0,
        }
    }

    pub fn with_evals(mut self, cost_evals: usize, grad_evals: usize) -> Self {
        self.cost_evals = cost_evals;
        self.grad_evals = grad_evals;
        self
    }
}

/// Callback interface for search progress
pub trait SearchCallback {
    /// Called at each iteration with the best parameters and cost so far
    fn on_iteration(&mut self, iteration: u32, params: &[f64], cost: f64) -> Result<()>;

    /// Check if the search should stop early
    fn should_stop(&self) -> bool {
        false
    }
}

/// Core problem definition
pub trait Problem {
    /// Evaluate the loss for given parameters (runs simulation)
    fn evaluate(&self, params: &[f64]) -> Result<Evaluation>;

    /// Number of parameters
    fn num_params(&self) -> usize;

    /// Initial parameter values
    fn initial_params(&self) -> &[f64];

    /// Parameter bounds (min, max); infinite where unbounded
    fn bounds(&self) -> &[(f64, f64)];
}

/// Search strategy interface - takes problem and callback
pub trait Strategy {
    fn name(&self) -> &str;

    /// Whether every parameter needs finite bounds.
    fn requires_bounds(&self) -> bool {
        true
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn SearchCallback,
    ) -> Result<StrategyResult>;
}

/// Candidate that triggered an early stop.
#[derive(Debug, Clone)]
pub(crate) struct Halt {
    pub params: Vec<f64>,
    pub loss: f64,
}

impl Halt {
    pub fn into_result(self, iterations: u32, cost_evals: usize, grad_evals: usize) -> StrategyResult {
        StrategyResult::new(Termination::EarlyStopped, self.loss, iterations, self.params)
            .with_evals(cost_evals, grad_evals)
    }
}

/// Evaluate `params`, counting the call. `Break` carries the candidate when
/// the problem asks to stop.
pub(crate) fn probe(
    problem: &dyn Problem,
    params: &[f64],
    cost_evals: &mut usize,
) -> Result<ControlFlow<Halt, f64>> {
    *cost_evals += 1;
    Ok(match problem.evaluate(params)? {
        Evaluation::Continue(loss) => ControlFlow::Continue(loss),
        Evaluation::Stop(loss) => ControlFlow::Break(Halt {
            params: params.to_vec(),
            loss,
        }),
    })
}

#[inline]
pub fn clamp_to_bounds(params: &mut [f64], bounds: &[(f64, f64)]) {
    for (p, &(min, max)) in params.iter_mut().zip(bounds) {
        *p = p.clamp(min, max);
    }
}

pub(crate) fn is_bounded(bounds: &[(f64, f64)]) -> bool {
    bounds.iter().all(|(min, max)| min.is_finite() && max.is_finite())
}

// ============================================================================
// WRITING A STRATEGY
// ============================================================================
//
// 1. Store hyperparameters in a struct and implement `Strategy`. Return
//    `false` from `requires_bounds()` only if the algorithm copes with
//    infinite bounds; the optimizer rejects unbounded parameters otherwise.
//
// 2. Evaluate through `probe()`, never `problem.evaluate()` directly:
//
//        let cost = match probe(problem, &params, &mut cost_evals)? {
//            ControlFlow::Continue(cost) => cost,
//            ControlFlow::Break(halt) => {
//                return Ok(halt.into_result(iter + 1, cost_evals, grad_evals));
//            }
//        };
//
//    A `Break` must be returned at once. The problem ignores every later call
//    anyway, so continuing only burns iterations.
//
// 3. After each iteration call `callback.on_iteration()` with the best point
//    so far, then honour `callback.should_stop()`.
//
// 4. Every evaluation runs at least one circuit simulation. Count them in
//    `cost_evals` and keep the number per iteration small.
//
// 5. Register the strategy in `StrategyKind` and `select_strategy()`.
//
// ============================================================================
