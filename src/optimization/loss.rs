//! Building blocks for loss functions.

use crate::error::{CalculationError, Error, Result};

/// Turns an undefined metric into a penalty.
///
/// A metric that cannot be computed for a candidate (no crossing, range too
/// narrow) scores `penalty` instead of failing the search. Binding,
/// simulation and node lookup failures still propagate.
pub trait MetricExt {
    fn or_penalty(self, penalty: f64) -> Result<f64>;
}

impl MetricExt for Result<f64> {
    fn or_penalty(self, penalty: f64) -> Result<f64> {
        match self {
            Err(Error::Calculation(err)) => {
                tracing::debug!(error = %err, penalty, "metric undefined, using penalty");
                Ok(penalty)
            }
            other => other,
        }
    }
}

impl MetricExt for std::result::Result<f64, CalculationError> {
    fn or_penalty(self, penalty: f64) -> Result<f64> {
        self.map_err(Error::from).or_penalty(penalty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetMode {
    /// Achieved value should stay at or below the target
    Min,
    /// Achieved value should reach at least the target
    Max,
    Target,
}

/// A weighted goal on one metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    pub value: f64,
    pub weight: f64,
    pub mode: TargetMode,
}

impl Target {
    pub fn new(value: f64, weight: f64, mode: TargetMode) -> Self {
        Self { value, weight, mode }
    }

    pub fn at_most(value: f64) -> Self {
        Self::new(value, 1.0, TargetMode::Min)
    }

    pub fn at_least(value: f64) -> Self {
        Self::new(value, 1.0, TargetMode::Max)
    }

    pub fn exactly(value: f64) -> Self {
        Self::new(value, 1.0, TargetMode::Target)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Weighted shortfall, relative to the target magnitude when it is nonzero.
    pub fn compute_cost(&self, achieved: f64) -> f64 {
        let error = match self.mode {
            TargetMode::Min => (achieved - self.value).max(0.0),
            TargetMode::Max => (self.value - achieved).max(0.0),
            TargetMode::Target => (achieved - self.value).abs(),
        };
        let scale = if self.value != 0.0 { self.value.abs() } else { 1.0 };
        error / scale * self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn calculation_errors_become_penalties() {
        let undefined: Result<f64> = Err(CalculationError::TooFewSamples {
            metric: "bandwidth",
            axis: 1,
            values: 1,
        }
        .into());
        assert_relative_eq!(undefined.or_penalty(1e3).unwrap(), 1e3);

        let fine: Result<f64> = Ok(2.0);
        assert_relative_eq!(fine.or_penalty(1e3).unwrap(), 2.0);
    }

    #[test]
    fn other_errors_propagate() {
        let failed: Result<f64> = Err(Error::Config("boom".into()));
        assert!(matches!(failed.or_penalty(1.0), Err(Error::Config(_))));
    }

    #[test]
    fn target_costs_are_one_sided() {
        let floor = Target::at_least(60.0);
        assert_relative_eq!(floor.compute_cost(75.0), 0.0);
        assert_relative_eq!(floor.compute_cost(45.0), 0.25);

        let ceiling = Target::at_most(1e-3).with_weight(2.0);
        assert_relative_eq!(ceiling.compute_cost(5e-4), 0.0);
        assert_relative_eq!(ceiling.compute_cost(1.5e-3), 1.0, epsilon = 1e-12);

        let exact = Target::exactly(0.0);
        assert_relative_eq!(exact.compute_cost(-0.5), 0.5);
    }
}
