use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::simulation::Variation;

/// Default AC sweep used by the metric accessors of a circuit instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcSweep {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
    pub variation: Variation,
}

impl Default for AcSweep {
    fn default() -> Self {
        Self {
            start: 1.0,
            stop: 1e9,
            points: 10,
            variation: Variation::Dec,
        }
    }
}

/// Default transient window used by the metric accessors of a circuit instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientSweep {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

impl Default for TransientSweep {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 1e-6,
            points: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    pub ac: AcSweep,
    pub transient: TransientSweep,
}

/// Which search strategy drives the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Picked from the problem size and whether it is bounded.
    #[default]
    Auto,
    DifferentialEvolution,
    ParticleSwarm,
    GradientDescent,
    NelderMead,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Auto => "auto",
            StrategyKind::DifferentialEvolution => "differential_evolution",
            StrategyKind::ParticleSwarm => "particle_swarm",
            StrategyKind::GradientDescent => "gradient_descent",
            StrategyKind::NelderMead => "nelder_mead",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(StrategyKind::Auto),
            "differential_evolution" | "de" => Ok(StrategyKind::DifferentialEvolution),
            "particle_swarm" | "pso" => Ok(StrategyKind::ParticleSwarm),
            "gradient_descent" | "gradient" | "newton" => Ok(StrategyKind::GradientDescent),
            "nelder_mead" | "simplex" => Ok(StrategyKind::NelderMead),
            other => Err(Error::Config(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Search settings, loadable from JSON.
///
/// ```json
/// {
///   "strategy": "particle_swarm",
///   "max_iterations": 200,
///   "early_stop_loss": 1e-3,
///   "bounds": { "w1": [1e-6, 1e-4], "l": [1.8e-7, 2e-6] },
///   "seed": 7,
///   "analysis": { "ac": { "stop": 1e8, "points": 20 } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub strategy: StrategyKind,
    pub max_iterations: u32,
    /// Loss below which a strategy reports convergence.
    pub precision: f64,
    /// Loss at or below which the search stops with the current candidate.
    pub early_stop_loss: Option<f64>,
    /// Per-parameter `[min, max]`.
    pub bounds: HashMap<String, [f64; 2]>,
    /// Per-parameter starting point. Defaults to the lower bound, or 0 when
    /// unbounded.
    pub initial: HashMap<String, f64>,
    /// Population size for the population-based strategies.
    pub population: Option<usize>,
    pub seed: Option<u64>,
    /// Sweeps used by the metric accessors of every circuit the search binds.
    /// Overrides the templates' own defaults when present.
    pub analysis: Option<AnalysisDefaults>,
    /// Log every iteration at `info` instead of `trace`.
    pub verbose: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            max_iterations: 1000,
            precision: 1e-6,
            early_stop_loss: None,
            bounds: HashMap::new(),
            initial: HashMap::new(),
            population: None,
            seed: None,
            analysis: None,
            verbose: false,
        }
    }
}

impl SearchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_bound(mut self, name: &str, min: f64, max: f64) -> Self {
        self.bounds.insert(name.to_string(), [min, max]);
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_early_stop(mut self, loss: f64) -> Self {
        self.early_stop_loss = Some(loss);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisDefaults) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, &[min, max]) in &self.bounds {
            if !min.is_finite() || !max.is_finite() {
                return Err(Error::Config(format!(
                    "bounds for '{name}' must be finite, got [{min}, {max}]"
                )));
            }
            if min > max {
                return Err(Error::Config(format!(
                    "bounds for '{name}' are inverted: [{min}, {max}]"
                )));
            }
        }

        if let Some((name, value)) = self.initial.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Config(format!("initial value for '{name}' is {value}")));
        }

        if self.precision.is_nan() || self.precision <= 0.0 {
            return Err(Error::Config(format!(
                "precision must be positive, got {}",
                self.precision
            )));
        }

        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }

        if let Some(loss) = self.early_stop_loss.filter(|l| l.is_nan()) {
            return Err(Error::Config(format!("early_stop_loss is {loss}")));
        }

        if self.population == Some(0) {
            return Err(Error::Config("population must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = SearchConfig::from_json(r#"{"bounds": {"r": [1e3, 1e5]}}"#).unwrap();
        assert_eq!(config.strategy, StrategyKind::Auto);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.precision, 1e-6);
        assert_eq!(config.early_stop_loss, None);
        assert_eq!(config.bounds["r"], [1e3, 1e5]);
        assert_eq!(config.analysis, None);
        assert!(!config.verbose);
    }

    #[test]
    fn nested_analysis_defaults_are_partial() {
        let config = SearchConfig::from_json(
            r#"{"strategy": "nelder_mead", "analysis": {"ac": {"stop": 1e6, "variation": "oct"}}}"#,
        )
        .unwrap();
        assert_eq!(config.strategy, StrategyKind::NelderMead);
        let analysis = config.analysis.unwrap();
        assert_eq!(analysis.ac.start, 1.0);
        assert_eq!(analysis.ac.stop, 1e6);
        assert_eq!(analysis.ac.variation, Variation::Oct);
        assert_eq!(analysis.transient, TransientSweep::default());
    }

    #[test]
    fn verbose_progress_is_opt_in() {
        let config = SearchConfig::from_json(r#"{"verbose": true, "max_iterations": 5}"#).unwrap();
        assert!(config.verbose);
        assert_eq!(config.max_iterations, 5);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = SearchConfig::from_json(r#"{"bounds": {"w": [2.0, 1.0]}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("inverted")));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            SearchConfig::from_json(r#"{"max_iterations": "many"}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("PSO".parse::<StrategyKind>().unwrap(), StrategyKind::ParticleSwarm);
        assert_eq!(
            "differential-evolution".parse::<StrategyKind>().unwrap(),
            StrategyKind::DifferentialEvolution
        );
        assert!("annealing".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::GradientDescent.to_string(), "gradient_descent");
    }
}
