pub mod callback;
pub mod loss;
pub mod optimizer;
pub mod problem;
pub mod solvers;

pub use callback::{IterationRecord, ProgressLog};
pub use loss::{MetricExt, Target, TargetMode};
pub use optimizer::{Optimizer, SearchOutcome};
pub use problem::{CircuitProblem, EvaluationRecord, SearchState};
pub use solvers::{
    DifferentialEvolution, GradientDescent, NelderMead, ParticleSwarm, select_strategy,
};
pub use solvers::{Evaluation, Problem, SearchCallback, Strategy, StrategyResult, Termination};
