use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use num_complex::Complex64;

use super::{
    Analysis, AnalysisKey, AnalysisResult, CircuitTemplate, OperatingPoint, SignalSet, Variation,
};
use crate::config::AnalysisDefaults;
use crate::error::{NodeNotFoundError, Result, SimulationError};
use crate::metrics;

/// Transfer function vout / vin over an AC sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyResponse {
    pub frequencies: Vec<f64>,
    pub response: Vec<Complex64>,
}

/// Input and output waveforms of a transient run. `input` is `None` when the
/// deck has no recognizable input node.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientResponse {
    pub times: Vec<f64>,
    pub input: Option<Vec<f64>>,
    pub output: Vec<f64>,
}

/// A template bound to concrete values.
///
/// Every distinct analysis request reaches the simulator at most once; results
/// live as long as the instance. Rebinding means creating a new instance.
pub struct CircuitInstance {
    template: CircuitTemplate,
    values: Vec<f64>,
    netlist: String,
    /// Sweeps behind the metric accessors
    defaults: AnalysisDefaults,
    results: RefCell<HashMap<AnalysisKey, Rc<AnalysisResult>>>,
    frequency: RefCell<HashMap<AnalysisKey, Rc<FrequencyResponse>>>,
    transient: RefCell<HashMap<AnalysisKey, Rc<TransientResponse>>>,
    simulations: Cell<usize>,
}

impl std::fmt::Debug for CircuitInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitInstance")
            .field("values", &self.values)
            .field("netlist", &self.netlist)
            .field("simulations", &self.simulations.get())
            .finish_non_exhaustive()
    }
}

impl CircuitInstance {
    pub(crate) fn new(
        template: CircuitTemplate,
        values: Vec<f64>,
        netlist: String,
        defaults: AnalysisDefaults,
    ) -> Self {
        Self {
            template,
            values,
            netlist,
            defaults,
            results: RefCell::new(HashMap::new()),
            frequency: RefCell::new(HashMap::new()),
            transient: RefCell::new(HashMap::new()),
            simulations: Cell::new(0),
        }
    }

    pub fn template(&self) -> &CircuitTemplate {
        &self.template
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn defaults(&self) -> &AnalysisDefaults {
        &self.defaults
    }

    /// Bound value of a named parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.template
            .specification()
            .index_of(name)
            .map(|i| self.values[i])
    }

    pub fn netlist(&self) -> &str {
        &self.netlist
    }

    /// Number of simulator calls made so far.
    pub fn simulations(&self) -> usize {
        self.simulations.get()
    }

    /// Raw simulator output for `request`, simulated on first use.
    pub fn analysis(&self, request: &Analysis) -> Result<Rc<AnalysisResult>> {
        let key = request.key();
        if let Some(hit) = self.results.borrow().get(&key) {
            tracing::debug!(analysis = request.kind(), "analysis cache hit");
            return Ok(Rc::clone(hit));
        }

        tracing::debug!(analysis = ?request, "running simulator");
        self.simulations.set(self.simulations.get() + 1);
        let result = self.template.simulator().simulate(&self.netlist, request)?;

        if result.kind() != request.kind() {
            return Err(SimulationError::UnexpectedResult {
                expected: request.kind(),
                found: result.kind(),
            }
            .into());
        }

        let result = Rc::new(result);
        self.results.borrow_mut().insert(key, Rc::clone(&result));
        Ok(result)
    }

    pub fn get_input<S: SignalSet>(&self, set: &S) -> std::result::Result<Vec<S::Sample>, NodeNotFoundError> {
        self.template.aliases().input(set)
    }

    pub fn get_output<S: SignalSet>(&self, set: &S) -> std::result::Result<Vec<S::Sample>, NodeNotFoundError> {
        self.template.aliases().output(set)
    }

    /// vout / vin over an AC sweep.
    pub fn frequency_response(
        &self,
        start: f64,
        stop: f64,
        points: usize,
        variation: Variation,
    ) -> Result<Rc<FrequencyResponse>> {
        let request = Analysis::Ac {
            start,
            stop,
            points,
            variation,
        };
        let key = request.key();
        if let Some(hit) = self.frequency.borrow().get(&key) {
            return Ok(Rc::clone(hit));
        }

        let result = self.analysis(&request)?;
        let ac = result.as_frequency().ok_or(SimulationError::UnexpectedResult {
            expected: request.kind(),
            found: result.kind(),
        })?;

        let output = self.get_output(ac)?;
        let input = self.get_input(ac)?;
        let response = FrequencyResponse {
            frequencies: ac.frequencies.clone(),
            response: output.iter().zip(&input).map(|(o, i)| o / i).collect(),
        };

        let response = Rc::new(response);
        self.frequency.borrow_mut().insert(key, Rc::clone(&response));
        Ok(response)
    }

    pub fn transient_response(&self, start: f64, stop: f64, points: usize) -> Result<Rc<TransientResponse>> {
        let request = Analysis::Transient {
            start,
            stop,
            points,
        };
        let key = request.key();
        if let Some(hit) = self.transient.borrow().get(&key) {
            return Ok(Rc::clone(hit));
        }

        let result = self.analysis(&request)?;
        let tran = result.as_transient().ok_or(SimulationError::UnexpectedResult {
            expected: request.kind(),
            found: result.kind(),
        })?;

        let response = Rc::new(TransientResponse {
            times: tran.times.clone(),
            input: self.get_input(tran).ok(),
            output: self.get_output(tran)?,
        });
        self.transient.borrow_mut().insert(key, Rc::clone(&response));
        Ok(response)
    }

    pub fn operating_point(&self) -> Result<OperatingPoint> {
        let request = Analysis::OperatingPoint;
        let result = self.analysis(&request)?;
        result
            .as_operating_point()
            .cloned()
            .ok_or_else(|| {
                SimulationError::UnexpectedResult {
                    expected: request.kind(),
                    found: result.kind(),
                }
                .into()
            })
    }

    /// Quiescent power drawn from the supply rail.
    pub fn static_power(&self) -> Result<f64> {
        let op = self.operating_point()?;
        Ok(self.template.aliases().supply_power(&op)?)
    }

    fn default_frequency_response(&self) -> Result<Rc<FrequencyResponse>> {
        let ac = self.defaults.ac;
        self.frequency_response(ac.start, ac.stop, ac.points, ac.variation)
    }

    fn default_transient_response(&self) -> Result<Rc<TransientResponse>> {
        let tran = self.defaults.transient;
        self.transient_response(tran.start, tran.stop, tran.points)
    }

    pub fn bandwidth(&self) -> Result<f64> {
        let fr = self.default_frequency_response()?;
        Ok(metrics::bandwidth(&fr.frequencies, &fr.response)?)
    }

    pub fn unity_gain_frequency(&self) -> Result<f64> {
        let fr = self.default_frequency_response()?;
        Ok(metrics::unity_gain_frequency(&fr.frequencies, &fr.response)?)
    }

    pub fn phase_margin(&self) -> Result<f64> {
        let fr = self.default_frequency_response()?;
        Ok(metrics::phase_margin(&fr.frequencies, &fr.response)?)
    }

    pub fn gain_margin(&self) -> Result<f64> {
        let fr = self.default_frequency_response()?;
        Ok(metrics::gain_margin(&fr.frequencies, &fr.response)?)
    }

    pub fn gain(&self) -> Result<Complex64> {
        let fr = self.default_frequency_response()?;
        Ok(metrics::gain(&fr.frequencies, &fr.response)?)
    }

    /// Slew rate of the output over the default transient window.
    pub fn slew_rate(&self) -> Result<f64> {
        let tr = self.default_transient_response()?;
        Ok(metrics::slew_rate(&tr.times, &tr.output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::simulation::{Simulator, TransientAnalysis};

    fn template(simulator: Rc<dyn Simulator>) -> CircuitTemplate {
        CircuitTemplate::new("V1 vin 0 {v}", simulator)
    }

    #[test]
    fn mismatched_result_kind_is_rejected_and_not_cached() {
        let sim = |_: &str, _: &Analysis| -> std::result::Result<AnalysisResult, SimulationError> {
            Ok(AnalysisResult::Transient(TransientAnalysis::default()))
        };
        let circuit = template(Rc::new(sim)).instantiate(&[1.0]).unwrap();

        let err = circuit.operating_point().unwrap_err();
        assert!(matches!(
            err,
            Error::Simulation(SimulationError::UnexpectedResult {
                expected: "operating point",
                found: "transient",
            })
        ));
        assert!(circuit.operating_point().is_err());
        assert_eq!(circuit.simulations(), 2);
    }

    #[test]
    fn simulator_failures_propagate() {
        let sim = |_: &str, _: &Analysis| -> std::result::Result<AnalysisResult, SimulationError> {
            Err(SimulationError::Failed("convergence".into()))
        };
        let circuit = template(Rc::new(sim)).instantiate(&[1.0]).unwrap();
        assert!(matches!(
            circuit.bandwidth(),
            Err(Error::Simulation(SimulationError::Failed(msg))) if msg == "convergence"
        ));
    }

    #[test]
    fn transient_without_input_node_still_resolves_output() {
        let sim = |_: &str, _: &Analysis| -> std::result::Result<AnalysisResult, SimulationError> {
            Ok(AnalysisResult::Transient(TransientAnalysis {
                times: vec![0.0, 1e-9, 2e-9],
                nodes: vec![("VOUT".into(), vec![0.0, 1.0, 1.5])],
            }))
        };
        let circuit = template(Rc::new(sim)).instantiate(&[1.0]).unwrap();
        let tr = circuit.transient_response(0.0, 2e-9, 3).unwrap();
        assert_eq!(tr.input, None);
        assert_eq!(tr.output, [0.0, 1.0, 1.5]);
        assert_eq!(circuit.parameter("v"), Some(1.0));
        assert_eq!(circuit.parameter("w"), None);
    }
}
