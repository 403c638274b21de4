use std::cell::{Cell, RefCell};

use argmin::core::{
    CostFunction, Executor, IterState, KV, Problem as ArgminProblem, Solver, State,
    TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead as ArgminNelderMead;

use super::traits::{
    Evaluation, Halt, Problem, SearchCallback, Strategy, StrategyResult, Termination,
    clamp_to_bounds,
};
use crate::error::{Error, Result};

/// Nelder-Mead simplex search, run by `argmin`.
///
/// Bounds are optional: when present, every vertex is clamped into them
/// before evaluation. The callback sees every completed iteration and can end
/// the run through `should_stop`.
pub struct NelderMead {
    max_iter: u32,
    precision: f64,
    /// Initial simplex edge as a fraction of each parameter's range or magnitude
    initial_step: f64,
}

impl NelderMead {
    pub fn new(max_iter: u32, precision: f64) -> Self {
        Self {
            max_iter,
            precision,
            initial_step: 0.05,
        }
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    /// Start point plus one vertex displaced along each axis
    fn initial_simplex(&self, start: &[f64], bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let mut simplex = vec![start.to_vec()];
        for (i, &(min, max)) in bounds.iter().enumerate() {
            let range = max - min;
            let delta = if range.is_finite() && range > 0.0 {
                self.initial_step * range
            } else if start[i] != 0.0 {
                self.initial_step * start[i].abs()
            } else {
                0.00025
            };

            let mut vertex = start.to_vec();
            // Step inwards when the start sits on the upper bound
            vertex[i] = if start[i] + delta <= max {
                start[i] + delta
            } else {
                start[i] - delta
            };
            simplex.push(vertex);
        }
        simplex
    }
}

type SimplexState = IterState<Vec<f64>, (), (), (), (), f64>;

/// Why the run ended before argmin's own criteria.
#[derive(Debug, Default)]
struct Interrupt {
    halt: RefCell<Option<Halt>>,
    failure: RefCell<Option<Error>>,
    by_callback: Cell<bool>,
}

impl Interrupt {
    fn is_set(&self) -> bool {
        self.halt.borrow().is_some() || self.failure.borrow().is_some() || self.by_callback.get()
    }
}

/// Bridges a [`Problem`] to argmin.
///
/// argmin unwraps costs while building the simplex, so `cost` never fails:
/// an early stop returns the stopping loss, an error is parked in
/// [`Interrupt`] and scores infinity. Once interrupted, vertices are not
/// evaluated any more.
struct Objective<'a> {
    problem: &'a dyn Problem,
    interrupt: &'a Interrupt,
    cost_evals: &'a Cell<usize>,
}

impl CostFunction for Objective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<f64, argmin::core::Error> {
        if self.interrupt.is_set() {
            return Ok(f64::INFINITY);
        }

        let mut params = param.clone();
        clamp_to_bounds(&mut params, self.problem.bounds());
        self.cost_evals.set(self.cost_evals.get() + 1);

        match self.problem.evaluate(&params) {
            Ok(Evaluation::Continue(loss)) => Ok(loss),
            Ok(Evaluation::Stop(loss)) => {
                *self.interrupt.halt.borrow_mut() = Some(Halt { params, loss });
                Ok(loss)
            }
            Err(err) => {
                *self.interrupt.failure.borrow_mut() = Some(err);
                Ok(f64::INFINITY)
            }
        }
    }
}

/// Wraps the argmin solver to report each iteration to the callback and to
/// end the run as soon as it is interrupted.
struct Guarded<'a, 'c, S> {
    inner: S,
    interrupt: &'a Interrupt,
    callback: &'a mut (dyn SearchCallback + 'c),
    bounds: &'a [(f64, f64)],
}

impl<O, S> Solver<O, SimplexState> for Guarded<'_, '_, S>
where
    S: Solver<O, SimplexState>,
{
    const NAME: &'static str = "Nelder-Mead";

    fn init(
        &mut self,
        problem: &mut ArgminProblem<O>,
        state: SimplexState,
    ) -> std::result::Result<(SimplexState, Option<KV>), argmin::core::Error> {
        self.inner.init(problem, state)
    }

    fn next_iter(
        &mut self,
        problem: &mut ArgminProblem<O>,
        state: SimplexState,
    ) -> std::result::Result<(SimplexState, Option<KV>), argmin::core::Error> {
        self.inner.next_iter(problem, state)
    }

    fn terminate_internal(&mut self, state: &SimplexState) -> TerminationStatus {
        if !self.interrupt.is_set() && state.get_iter() > 0 {
            if let Some(best) = state.get_best_param() {
                let mut params = best.clone();
                clamp_to_bounds(&mut params, self.bounds);
                let iteration = u32::try_from(state.get_iter()).unwrap_or(u32::MAX);
                match self.callback.on_iteration(iteration, &params, state.get_best_cost()) {
                    Ok(()) if self.callback.should_stop() => self.interrupt.by_callback.set(true),
                    Ok(()) => {}
                    Err(err) => *self.interrupt.failure.borrow_mut() = Some(err),
                }
            }
        }

        if self.interrupt.is_set() {
            return TerminationStatus::Terminated(TerminationReason::SolverExit(
                "search interrupted".into(),
            ));
        }
        self.inner.terminate_internal(state)
    }
}

impl Strategy for NelderMead {
    fn name(&self) -> &str {
        "NelderMead"
    }

    fn requires_bounds(&self) -> bool {
        false
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn SearchCallback,
    ) -> Result<StrategyResult> {
        let bounds = problem.bounds();
        let mut start = problem.initial_params().to_vec();
        clamp_to_bounds(&mut start, bounds);

        let strategy_error = |err: argmin::core::Error| Error::Strategy {
            strategy: "NelderMead".into(),
            message: err.to_string(),
        };

        let solver = ArgminNelderMead::new(self.initial_simplex(&start, bounds))
            .with_sd_tolerance(self.precision)
            .map_err(strategy_error)?;

        let interrupt = Interrupt::default();
        let evals = Cell::new(0);
        let objective = Objective {
            problem,
            interrupt: &interrupt,
            cost_evals: &evals,
        };
        let guarded = Guarded {
            inner: solver,
            interrupt: &interrupt,
            callback,
            bounds,
        };

        let max_iter = u64::from(self.max_iter);
        let outcome = Executor::new(objective, guarded)
            .configure(|state| state.max_iters(max_iter))
            .run()
            .map(|res| {
                let state = res.state();
                (
                    u32::try_from(state.get_iter()).unwrap_or(u32::MAX),
                    state.get_best_cost(),
                    state.get_best_param().cloned(),
                )
            });

        let cost_evals = evals.get();
        if let Some(halt) = interrupt.halt.take() {
            return Ok(halt.into_result(0, cost_evals, 0));
        }
        if let Some(err) = interrupt.failure.take() {
            return Err(err);
        }

        let (iterations, cost, best) = outcome.map_err(strategy_error)?;
        let mut params = best.unwrap_or(start);
        clamp_to_bounds(&mut params, bounds);

        let termination = if iterations >= self.max_iter {
            Termination::MaxIterations
        } else if interrupt.by_callback.get() {
            Termination::StoppedByCallback
        } else {
            Termination::Converged
        };

        Ok(StrategyResult::new(termination, cost, iterations, params).with_evals(cost_evals, 0))
    }
}
