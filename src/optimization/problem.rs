use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use crate::config::AnalysisDefaults;
use crate::error::{Error, Result};
use crate::optimization::solvers::{Evaluation, Problem};
use crate::simulation::Bindable;

/// Lifecycle of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Evaluating,
    EarlyStopped,
    Converged,
    Failed,
}

/// One loss evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub index: usize,
    pub params: Vec<f64>,
    pub loss: f64,
    pub elapsed: Duration,
}

/// The circuit(s) that met the early-stop threshold.
#[derive(Debug)]
pub(crate) struct Stopped<B> {
    pub circuit: B,
    pub params: Vec<f64>,
    pub loss: f64,
}

/// Circuit problem: binds each candidate vector, evaluates the user loss on
/// the bound circuit(s), and decides whether the search may continue.
pub struct CircuitProblem<'a, C: Bindable, L> {
    circuit: &'a C,
    loss: L,
    bounds: Vec<(f64, f64)>,
    initial: Vec<f64>,
    early_stop_loss: Option<f64>,
    /// Replaces the templates' analysis defaults on every bound circuit
    analysis: Option<AnalysisDefaults>,

    state: Cell<SearchState>,
    log: RefCell<Vec<EvaluationRecord>>,
    best: Cell<Option<usize>>,
    stop_loss: Cell<Option<f64>>,
    stopped: RefCell<Option<Stopped<C::Bound>>>,
}

impl<'a, C, L> CircuitProblem<'a, C, L>
where
    C: Bindable,
    L: Fn(&C::Bound) -> Result<f64>,
{
    pub fn new(
        circuit: &'a C,
        loss: L,
        bounds: Vec<(f64, f64)>,
        initial: Vec<f64>,
        early_stop_loss: Option<f64>,
    ) -> Self {
        Self {
            circuit,
            loss,
            bounds,
            initial,
            early_stop_loss,
            analysis: None,
            state: Cell::new(SearchState::Idle),
            log: RefCell::new(Vec::new()),
            best: Cell::new(None),
            stop_loss: Cell::new(None),
            stopped: RefCell::new(None),
        }
    }

    pub fn with_analysis(mut self, analysis: Option<AnalysisDefaults>) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn circuit(&self) -> &'a C {
        self.circuit
    }

    /// Bind `params` the way candidates are bound during the search.
    pub fn bind(&self, params: &[f64]) -> Result<C::Bound> {
        self.circuit.bind_with(params, self.analysis.as_ref())
    }

    /// Bind, evaluate and record one candidate.
    ///
    /// Once a candidate has met the early-stop threshold every later call
    /// returns `Stop` with that candidate's loss and evaluates nothing.
    pub fn evaluate_params(&self, params: &[f64]) -> Result<Evaluation> {
        if let Some(loss) = self.stop_loss.get() {
            return Ok(Evaluation::Stop(loss));
        }
        self.state.set(SearchState::Evaluating);

        let start = Instant::now();
        let circuit = self.bind(params)?;
        let loss = (self.loss)(&circuit)?;
        let elapsed = start.elapsed();

        if !loss.is_finite() {
            tracing::warn!(?params, loss, "loss function returned a non-finite value");
            return Err(Error::InvalidLoss(loss));
        }

        let index = {
            let mut log = self.log.borrow_mut();
            let index = log.len();
            log.push(EvaluationRecord {
                index,
                params: params.to_vec(),
                loss,
                elapsed,
            });
            if self.best.get().is_none_or(|best| loss < log[best].loss) {
                self.best.set(Some(index));
            }
            index
        };

        tracing::debug!(
            index,
            loss,
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "evaluated candidate"
        );

        if self.early_stop_loss.is_some_and(|threshold| loss <= threshold) {
            tracing::info!(index, loss, "early stop loss reached");
            self.state.set(SearchState::EarlyStopped);
            self.stop_loss.set(Some(loss));
            *self.stopped.borrow_mut() = Some(Stopped {
                circuit,
                params: params.to_vec(),
                loss,
            });
            return Ok(Evaluation::Stop(loss));
        }

        Ok(Evaluation::Continue(loss))
    }

    pub fn state(&self) -> SearchState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: SearchState) {
        self.state.set(state);
    }

    pub fn evaluations(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn history(&self) -> Vec<EvaluationRecord> {
        self.log.borrow().clone()
    }

    /// Lowest-loss evaluation so far.
    pub fn best(&self) -> Option<EvaluationRecord> {
        let best = self.best.get()?;
        self.log.borrow().get(best).cloned()
    }

    pub(crate) fn take_stopped(&self) -> Option<Stopped<C::Bound>> {
        self.stopped.borrow_mut().take()
    }
}

impl<C, L> Problem for CircuitProblem<'_, C, L>
where
    C: Bindable,
    L: Fn(&C::Bound) -> Result<f64>,
{
    fn evaluate(&self, params: &[f64]) -> Result<Evaluation> {
        self.evaluate_params(params)
    }

    fn num_params(&self) -> usize {
        self.bounds.len()
    }

    fn initial_params(&self) -> &[f64] {
        &self.initial
    }

    fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }
}
