use thiserror::Error;

/// A metric is undefined for the sampled data.
///
/// Every variant carries the boundary values needed to tell an undersampled
/// simulation apart from a circuit that genuinely never reaches the threshold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    #[error(
        "cannot compute {metric}: no sample reaches {threshold:e} (reference {start:e}, last sample {end:e}); \
         simulate a wider range or the circuit has no such crossing"
    )]
    NoCrossing {
        metric: &'static str,
        threshold: f64,
        start: f64,
        end: f64,
    },

    #[error("cannot compute {metric}: {target:e} lies outside the sampled range [{lower:e}, {upper:e}]")]
    OutOfRange {
        metric: &'static str,
        target: f64,
        lower: f64,
        upper: f64,
    },

    #[error("cannot compute {metric}: need two or more samples of equal length, got {axis} axis and {values} value samples")]
    TooFewSamples {
        metric: &'static str,
        axis: usize,
        values: usize,
    },
}

/// A parameter vector does not fit a specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("expected {expected} parameter values [{}], received {received}", .names.join(", "))]
    CountMismatch {
        expected: usize,
        received: usize,
        names: Vec<String>,
    },

    #[error("no value supplied for placeholder '{name}'")]
    MissingValue { name: String },
}

/// None of the conventional aliases for a node role exist in a result.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no {role} node found, tried: {}", .tried.join(", "))]
pub struct NodeNotFoundError {
    pub role: &'static str,
    pub tried: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("simulator failed: {0}")]
    Failed(String),

    #[error("requested {expected} analysis, simulator returned {found}")]
    UnexpectedResult {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    NodeNotFound(#[from] NodeNotFoundError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("strategy {strategy} failed: {message}")]
    Strategy { strategy: String, message: String },

    #[error("loss function returned a non-finite value ({0})")]
    InvalidLoss(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
