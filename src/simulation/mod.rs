//! The boundary to the external circuit simulator and the circuits built on it.

pub mod instance;
pub mod nodes;
pub mod template;

pub use instance::{CircuitInstance, FrequencyResponse, TransientResponse};
pub use nodes::{NodeAliases, Probe};
pub use template::{Bindable, CircuitTemplate, TemplateGroup};

use std::ops::Sub;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// AC sweep spacing, matching SPICE `.ac dec|oct|lin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variation {
    /// `points` per decade
    #[default]
    Dec,
    /// `points` per octave
    Oct,
    /// `points` in total
    Lin,
}

impl Variation {
    pub fn as_str(self) -> &'static str {
        match self {
            Variation::Dec => "dec",
            Variation::Oct => "oct",
            Variation::Lin => "lin",
        }
    }

    /// Frequency points of a sweep from `start` to `stop`, both included when
    /// the spacing lands on them.
    pub fn sweep(self, start: f64, stop: f64, points: usize) -> Vec<f64> {
        let logarithmic = |ratio: f64, span: f64| -> Vec<f64> {
            let total = (points as f64 * span + 1e-9).floor() as usize + 1;
            (0..total)
                .map(|i| start * ratio.powf(i as f64 / points as f64))
                .collect()
        };

        match self {
            _ if points == 0 => Vec::new(),
            Variation::Dec => logarithmic(10.0, (stop / start).log10()),
            Variation::Oct => logarithmic(2.0, (stop / start).log2()),
            Variation::Lin => {
                if points == 1 {
                    return vec![start];
                }
                let step = (stop - start) / (points - 1) as f64;
                (0..points).map(|i| start + step * i as f64).collect()
            }
        }
    }
}

/// One simulator request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Analysis {
    Ac {
        start: f64,
        stop: f64,
        points: usize,
        variation: Variation,
    },
    Transient {
        start: f64,
        stop: f64,
        points: usize,
    },
    OperatingPoint,
}

impl Analysis {
    pub fn kind(&self) -> &'static str {
        match self {
            Analysis::Ac { .. } => "ac",
            Analysis::Transient { .. } => "transient",
            Analysis::OperatingPoint => "operating point",
        }
    }

    pub(crate) fn key(&self) -> AnalysisKey {
        match *self {
            Analysis::Ac {
                start,
                stop,
                points,
                variation,
            } => AnalysisKey::Ac {
                start: start.to_bits(),
                stop: stop.to_bits(),
                points,
                variation,
            },
            Analysis::Transient {
                start,
                stop,
                points,
            } => AnalysisKey::Transient {
                start: start.to_bits(),
                stop: stop.to_bits(),
                points,
            },
            Analysis::OperatingPoint => AnalysisKey::OperatingPoint,
        }
    }
}

/// Hashable identity of an [`Analysis`]: floats compared bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum AnalysisKey {
    Ac {
        start: u64,
        stop: u64,
        points: usize,
        variation: Variation,
    },
    Transient {
        start: u64,
        stop: u64,
        points: usize,
    },
    OperatingPoint,
}

/// Named waveforms sharing one sweep axis.
pub trait SignalSet {
    type Sample: Copy + Sub<Output = Self::Sample>;

    fn signals(&self) -> &[(String, Vec<Self::Sample>)];

    /// Case-insensitive lookup.
    fn signal(&self, name: &str) -> Option<&[Self::Sample]> {
        self.signals()
            .iter()
            .find(|(node, _)| node.eq_ignore_ascii_case(name))
            .map(|(_, samples)| samples.as_slice())
    }
}

/// AC sweep output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyAnalysis {
    /// Frequency points (Hz).
    pub frequencies: Vec<f64>,
    /// Per-node complex voltage at each frequency.
    pub nodes: Vec<(String, Vec<Complex64>)>,
}

impl SignalSet for FrequencyAnalysis {
    type Sample = Complex64;

    fn signals(&self) -> &[(String, Vec<Complex64>)] {
        &self.nodes
    }
}

/// Transient output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransientAnalysis {
    /// Time points (s).
    pub times: Vec<f64>,
    /// Per-node voltage waveform.
    pub nodes: Vec<(String, Vec<f64>)>,
}

impl SignalSet for TransientAnalysis {
    type Sample = f64;

    fn signals(&self) -> &[(String, Vec<f64>)] {
        &self.nodes
    }
}

/// DC operating point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperatingPoint {
    pub node_voltages: Vec<(String, f64)>,
    /// Branch currents, named either `V1`, `v1#branch` or `I(V1)`.
    pub branch_currents: Vec<(String, f64)>,
}

impl OperatingPoint {
    pub fn voltage(&self, node: &str) -> Option<f64> {
        self.node_voltages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(node))
            .map(|&(_, v)| v)
    }

    /// Current through the voltage source `source`, whatever the branch
    /// naming convention of the simulator.
    pub fn current(&self, source: &str) -> Option<f64> {
        self.branch_currents
            .iter()
            .find(|(name, _)| branch_source(name).eq_ignore_ascii_case(source))
            .map(|&(_, i)| i)
    }
}

fn branch_source(name: &str) -> &str {
    let name = name.trim();
    let name = name
        .strip_prefix("i(")
        .or_else(|| name.strip_prefix("I("))
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(name);
    name.strip_suffix("#branch").unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Frequency(FrequencyAnalysis),
    Transient(TransientAnalysis),
    OperatingPoint(OperatingPoint),
}

impl AnalysisResult {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisResult::Frequency(_) => "ac",
            AnalysisResult::Transient(_) => "transient",
            AnalysisResult::OperatingPoint(_) => "operating point",
        }
    }

    pub fn as_frequency(&self) -> Option<&FrequencyAnalysis> {
        match self {
            AnalysisResult::Frequency(ac) => Some(ac),
            _ => None,
        }
    }

    pub fn as_transient(&self) -> Option<&TransientAnalysis> {
        match self {
            AnalysisResult::Transient(tran) => Some(tran),
            _ => None,
        }
    }

    pub fn as_operating_point(&self) -> Option<&OperatingPoint> {
        match self {
            AnalysisResult::OperatingPoint(op) => Some(op),
            _ => None,
        }
    }
}

/// External circuit simulator.
///
/// One call runs one analysis on a complete netlist. Calls block until the
/// simulator returns; a hung simulator hangs the caller.
pub trait Simulator {
    fn simulate(&self, netlist: &str, analysis: &Analysis) -> Result<AnalysisResult, SimulationError>;
}

impl<F> Simulator for F
where
    F: Fn(&str, &Analysis) -> Result<AnalysisResult, SimulationError>,
{
    fn simulate(&self, netlist: &str, analysis: &Analysis) -> Result<AnalysisResult, SimulationError> {
        self(netlist, analysis)
    }
}
