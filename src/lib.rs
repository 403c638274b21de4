//! Analog circuit sizing.
//!
//! A netlist with `{name}` placeholders becomes a [`CircuitTemplate`]. Binding
//! a parameter vector yields a [`CircuitInstance`] that runs analyses on an
//! external [`Simulator`], caches them, and extracts metrics (bandwidth, phase
//! margin, slew rate, ...). An [`Optimizer`] searches the parameter space with
//! a pluggable [`Strategy`] against a user loss, stopping as soon as the loss
//! falls below an optional threshold.

pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod optimization;
pub mod simulation;

pub use crate::config::{AnalysisDefaults, SearchConfig, StrategyKind};
pub use crate::core::{Specification, SpecificationGroup, format_value};
pub use crate::error::{BindingError, CalculationError, Error, NodeNotFoundError, Result, SimulationError};
pub use crate::optimization::{
    Evaluation, MetricExt, Optimizer, SearchOutcome, SearchState, Strategy, Target, TargetMode,
    Termination,
};
pub use crate::simulation::{
    Analysis, AnalysisResult, Bindable, CircuitInstance, CircuitTemplate, NodeAliases, Simulator,
    TemplateGroup, Variation,
};
