use std::cell::Cell;
use std::time::{Duration, Instant};

use super::callback::{IterationRecord, ProgressLog};
use super::problem::{CircuitProblem, EvaluationRecord, SearchState};
use super::solvers::{Evaluation, Problem, Strategy, Termination, select_strategy};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::simulation::Bindable;

/// Final result of a search.
#[derive(Debug)]
pub struct SearchOutcome<B> {
    /// Circuit(s) bound to the final vector
    pub circuit: B,
    pub params: Vec<f64>,
    pub names: Vec<String>,
    pub loss: f64,
    pub state: SearchState,
    pub termination: Termination,
    pub evaluations: usize,
    pub elapsed: Duration,
    pub strategy: String,
    pub history: Vec<IterationRecord>,
}

impl<B> SearchOutcome<B> {
    pub fn parameter(&self, name: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == name)?;
        self.params.get(i).copied()
    }
}

/// Drives a strategy over a circuit template (or template group) and a loss.
///
/// A search runs once. Its state and evaluation history stay readable after
/// `run` returns, including when it failed.
pub struct Optimizer<'a, C: Bindable, L> {
    problem: CircuitProblem<'a, C, L>,
    names: Vec<String>,
    config: SearchConfig,
    finished: Cell<bool>,
}

impl<'a, C, L> Optimizer<'a, C, L>
where
    C: Bindable,
    L: Fn(&C::Bound) -> Result<f64>,
{
    pub fn new(circuit: &'a C, loss: L, config: SearchConfig) -> Result<Self> {
        config.validate()?;

        let names: Vec<String> = circuit.parameters().iter().cloned().collect();
        let bounds: Vec<(f64, f64)> = names
            .iter()
            .map(|name| match config.bounds.get(name) {
                Some(&[min, max]) => (min, max),
                None => (f64::NEG_INFINITY, f64::INFINITY),
            })
            .collect();
        let initial = names
            .iter()
            .zip(&bounds)
            .map(|(name, &(min, _))| match config.initial.get(name) {
                Some(&value) => value,
                None if min.is_finite() => min,
                None => 0.0,
            })
            .collect();

        for unknown in config.bounds.keys().filter(|k| !names.contains(k)) {
            tracing::warn!(parameter = %unknown, "bound given for a parameter the circuit does not use");
        }

        let problem = CircuitProblem::new(circuit, loss, bounds, initial, config.early_stop_loss)
            .with_analysis(config.analysis);
        Ok(Self {
            problem,
            names,
            config,
            finished: Cell::new(false),
        })
    }

    /// Evaluate one vector outside of any strategy.
    pub fn evaluate(&self, params: &[f64]) -> Result<Evaluation> {
        self.problem.evaluate_params(params)
    }

    pub fn state(&self) -> SearchState {
        self.problem.state()
    }

    pub fn history(&self) -> Vec<EvaluationRecord> {
        self.problem.history()
    }

    pub fn problem(&self) -> &CircuitProblem<'a, C, L> {
        &self.problem
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Run the strategy named in the configuration.
    pub fn run(&self) -> Result<SearchOutcome<C::Bound>> {
        let (mut strategy, reason) = select_strategy(&self.config, self.problem.bounds());
        tracing::info!(strategy = strategy.name(), %reason, "selected strategy");
        self.run_with(strategy.as_mut())
    }

    pub fn run_with(&self, strategy: &mut dyn Strategy) -> Result<SearchOutcome<C::Bound>> {
        if self.finished.get() {
            return Err(Error::Config("this optimizer has already run a search".into()));
        }

        if strategy.requires_bounds() {
            let missing: Vec<&str> = self
                .names
                .iter()
                .zip(self.problem.bounds())
                .filter(|(_, (min, max))| !(min.is_finite() && max.is_finite()))
                .map(|(name, _)| name.as_str())
                .collect();
            if !missing.is_empty() {
                return Err(Error::Config(format!(
                    "{} requires bounds for every parameter, missing: {}",
                    strategy.name(),
                    missing.join(", ")
                )));
            }
        }

        self.finished.set(true);
        let start = Instant::now();
        let mut progress = ProgressLog::new(
            self.config.verbose,
            self.config.max_iterations,
            self.names.clone(),
        );
        let result = match strategy.solve(&self.problem, &mut progress) {
            Ok(result) => result,
            Err(err) => {
                self.problem.set_state(SearchState::Failed);
                tracing::warn!(strategy = strategy.name(), error = %err, "search failed");
                return Err(err);
            }
        };
        let elapsed = start.elapsed();
        progress.summary(result.termination.is_success(), &result.message);

        let evaluations = self.problem.evaluations();
        let strategy_name = strategy.name().to_string();

        if let Some(stopped) = self.problem.take_stopped() {
            return Ok(SearchOutcome {
                circuit: stopped.circuit,
                params: stopped.params,
                names: self.names.clone(),
                loss: stopped.loss,
                state: SearchState::EarlyStopped,
                termination: Termination::EarlyStopped,
                evaluations,
                elapsed,
                strategy: strategy_name,
                history: progress.into_history(),
            });
        }

        let circuit = self.problem.bind(&result.params)?;
        self.problem.set_state(SearchState::Converged);
        tracing::info!(
            strategy = %strategy_name,
            loss = result.cost,
            evaluations,
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "search complete"
        );

        Ok(SearchOutcome {
            circuit,
            params: result.params,
            names: self.names.clone(),
            loss: result.cost,
            state: SearchState::Converged,
            termination: result.termination,
            evaluations,
            elapsed,
            strategy: strategy_name,
            history: progress.into_history(),
        })
    }
}
