use serde::{Deserialize, Serialize};

use super::{OperatingPoint, SignalSet};
use crate::error::NodeNotFoundError;

/// Where a signal is read from: one node, or the difference of two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Probe {
    Single(String),
    Differential(String, String),
}

impl Probe {
    pub fn single(node: &str) -> Self {
        Probe::Single(node.to_string())
    }

    pub fn differential(positive: &str, negative: &str) -> Self {
        Probe::Differential(positive.to_string(), negative.to_string())
    }

    /// Reads the probed waveform; `None` if any node involved is absent.
    pub fn read<S: SignalSet>(&self, set: &S) -> Option<Vec<S::Sample>> {
        match self {
            Probe::Single(node) => set.signal(node).map(<[S::Sample]>::to_vec),
            Probe::Differential(p, n) => {
                let (p, n) = (set.signal(p)?, set.signal(n)?);
                Some(p.iter().zip(n).map(|(&p, &n)| p - n).collect())
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Probe::Single(node) => node.clone(),
            Probe::Differential(p, n) => format!("{p}/{n}"),
        }
    }
}

/// Ordered node-name candidates for each signal role.
///
/// The first candidate present in a result wins, so differential pairs are
/// listed before single-ended names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAliases {
    pub input: Vec<Probe>,
    pub output: Vec<Probe>,
    /// Supply rails; each name is also taken as the name of the source driving it.
    pub supply: Vec<String>,
}

impl Default for NodeAliases {
    fn default() -> Self {
        Self {
            input: vec![
                Probe::differential("vin+", "vin-"),
                Probe::differential("vi+", "vi-"),
                Probe::differential("vp", "vn"),
                Probe::single("vin"),
                Probe::single("vi"),
            ],
            output: vec![Probe::single("vout"), Probe::single("vo")],
            supply: vec!["vdd".into(), "vcc".into(), "avdd".into()],
        }
    }
}

fn resolve<S: SignalSet>(
    role: &'static str,
    candidates: &[Probe],
    set: &S,
) -> Result<Vec<S::Sample>, NodeNotFoundError> {
    candidates
        .iter()
        .find_map(|probe| probe.read(set))
        .ok_or_else(|| NodeNotFoundError {
            role,
            tried: candidates.iter().map(Probe::describe).collect(),
        })
}

impl NodeAliases {
    pub fn input<S: SignalSet>(&self, set: &S) -> Result<Vec<S::Sample>, NodeNotFoundError> {
        resolve("input", &self.input, set)
    }

    pub fn output<S: SignalSet>(&self, set: &S) -> Result<Vec<S::Sample>, NodeNotFoundError> {
        resolve("output", &self.output, set)
    }

    /// |V(rail) · I(source)| for the first supply rail with both a voltage and
    /// a source current in `op`.
    pub fn supply_power(&self, op: &OperatingPoint) -> Result<f64, NodeNotFoundError> {
        self.supply
            .iter()
            .find_map(|rail| Some((op.voltage(rail)? * op.current(rail)?).abs()))
            .ok_or_else(|| NodeNotFoundError {
                role: "supply",
                tried: self.supply.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{FrequencyAnalysis, TransientAnalysis};
    use num_complex::Complex64;

    fn tran(nodes: &[(&str, f64)]) -> TransientAnalysis {
        TransientAnalysis {
            times: vec![0.0, 1.0],
            nodes: nodes
                .iter()
                .map(|&(name, v)| (name.to_string(), vec![v, 2.0 * v]))
                .collect(),
        }
    }

    #[test]
    fn differential_input_wins_over_single_ended() {
        let set = tran(&[("Vin", 5.0), ("VIN+", 3.0), ("vin-", 1.0)]);
        assert_eq!(NodeAliases::default().input(&set).unwrap(), [2.0, 4.0]);
    }

    #[test]
    fn incomplete_pair_falls_through() {
        let set = tran(&[("vp", 3.0), ("vi", 0.5)]);
        assert_eq!(NodeAliases::default().input(&set).unwrap(), [0.5, 1.0]);
    }

    #[test]
    fn missing_output_lists_every_alias() {
        let set = FrequencyAnalysis {
            frequencies: vec![1.0],
            nodes: vec![("out".into(), vec![Complex64::new(1.0, 0.0)])],
        };
        let err = NodeAliases::default().output(&set).unwrap_err();
        assert_eq!(err.role, "output");
        assert_eq!(err.tried, ["vout", "vo"]);
    }

    #[test]
    fn custom_aliases_deserialize_from_json() {
        let aliases: NodeAliases =
            serde_json::from_str(r#"{"output": [["outp", "outn"], "out"]}"#).unwrap();
        assert_eq!(
            aliases.output,
            [Probe::differential("outp", "outn"), Probe::single("out")]
        );
        assert_eq!(aliases.input, NodeAliases::default().input);
    }

    #[test]
    fn supply_power_uses_first_complete_rail() {
        let op = OperatingPoint {
            node_voltages: vec![("vcc".into(), 5.0), ("vdd".into(), 1.8)],
            branch_currents: vec![("vcc#branch".into(), -2e-3)],
        };
        let power = NodeAliases::default().supply_power(&op).unwrap();
        assert!((power - 1e-2).abs() < 1e-15);

        let err = NodeAliases::default()
            .supply_power(&OperatingPoint::default())
            .unwrap_err();
        assert_eq!(err.role, "supply");
    }
}
