#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::f64::consts::PI;
use std::rc::Rc;

use num_complex::Complex64;
use sizer::simulation::{FrequencyAnalysis, OperatingPoint, TransientAnalysis};
use sizer::{Analysis, AnalysisResult, CircuitTemplate, SimulationError, Simulator};

/// Behavioural amplifier driven by `key=value` tokens in the netlist:
/// `gain` (default 1000), `pole`, `pole2`, `pole3` in Hz, `ibias` in A.
#[derive(Default)]
pub struct FakeAmplifier {
    calls: Cell<usize>,
    requests: RefCell<Vec<Analysis>>,
}

impl FakeAmplifier {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Every analysis requested so far, in order.
    pub fn requests(&self) -> Vec<Analysis> {
        self.requests.borrow().clone()
    }
}

pub fn field(netlist: &str, key: &str) -> Option<f64> {
    netlist
        .split_whitespace()
        .find_map(|token| token.strip_prefix(key)?.strip_prefix('=')?.parse().ok())
}

pub fn response(netlist: &str, f: f64) -> Complex64 {
    let gain = field(netlist, "gain").unwrap_or(1e3);
    ["pole", "pole2", "pole3"]
        .iter()
        .filter_map(|key| field(netlist, key))
        .fold(Complex64::new(gain, 0.0), |h, pole| {
            h / Complex64::new(1.0, f / pole)
        })
}

impl Simulator for FakeAmplifier {
    fn simulate(&self, netlist: &str, analysis: &Analysis) -> Result<AnalysisResult, SimulationError> {
        self.calls.set(self.calls.get() + 1);
        self.requests.borrow_mut().push(*analysis);

        match *analysis {
            Analysis::Ac {
                start,
                stop,
                points,
                variation,
            } => {
                let frequencies = variation.sweep(start, stop, points);
                let output = frequencies.iter().map(|&f| response(netlist, f)).collect();
                let input = vec![Complex64::new(1.0, 0.0); frequencies.len()];
                Ok(AnalysisResult::Frequency(FrequencyAnalysis {
                    frequencies,
                    nodes: vec![("vin".into(), input), ("vout".into(), output)],
                }))
            }
            Analysis::Transient {
                start,
                stop,
                points,
            } => {
                let tau = 1.0 / (2.0 * PI * field(netlist, "pole").unwrap_or(1e6));
                let step = (stop - start) / (points.max(2) - 1) as f64;
                let times: Vec<f64> = (0..points).map(|i| start + step * i as f64).collect();
                let output = times.iter().map(|&t| 1.0 - (-t / tau).exp()).collect();
                Ok(AnalysisResult::Transient(TransientAnalysis {
                    times,
                    nodes: vec![("vout".into(), output)],
                }))
            }
            Analysis::OperatingPoint => {
                let ibias = field(netlist, "ibias").unwrap_or(1e-3);
                Ok(AnalysisResult::OperatingPoint(OperatingPoint {
                    node_voltages: vec![("vdd".into(), 1.8), ("vout".into(), 0.9)],
                    branch_currents: vec![("vdd#branch".into(), -ibias)],
                }))
            }
        }
    }
}

pub fn amplifier(netlist: &str, simulator: &Rc<FakeAmplifier>) -> CircuitTemplate {
    let simulator: Rc<dyn Simulator> = Rc::clone(simulator) as Rc<dyn Simulator>;
    CircuitTemplate::new(netlist, simulator)
}

/// `points` log-spaced frequencies over 1 Hz to 10^decades Hz.
pub fn logspace(decades: f64, points: usize) -> Vec<f64> {
    (0..points)
        .map(|i| 10f64.powf(decades * i as f64 / (points - 1) as f64))
        .collect()
}
