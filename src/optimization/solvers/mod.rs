mod differential_evolution;
mod gradient;
mod nelder_mead;
mod particle;
pub mod traits;

pub use differential_evolution::DifferentialEvolution;
pub use gradient::GradientDescent;
pub use nelder_mead::NelderMead;
pub use particle::ParticleSwarm;
pub use traits::{
    Evaluation, Problem, SearchCallback, Strategy, StrategyResult, Termination, clamp_to_bounds,
};

use crate::config::{SearchConfig, StrategyKind};
use traits::is_bounded;

fn particle_swarm(config: &SearchConfig, population: usize) -> ParticleSwarm {
    ParticleSwarm::new(config.max_iterations, config.precision)
        .with_population_size(config.population.unwrap_or(population))
        .with_seed(config.seed)
}

fn differential_evolution(config: &SearchConfig) -> DifferentialEvolution {
    let de = DifferentialEvolution::new(config.max_iterations, config.precision).with_seed(config.seed);
    match config.population {
        Some(size) => de.with_population_size(size),
        None => de,
    }
}

/// Build the configured strategy, or pick one for `auto`.
///
/// Returns the strategy and a one-line reason for the choice.
pub fn select_strategy(config: &SearchConfig, bounds: &[(f64, f64)]) -> (Box<dyn Strategy>, String) {
    let n = bounds.len();
    let (max_iter, precision) = (config.max_iterations, config.precision);

    let (strategy, reason): (Box<dyn Strategy>, String) = match config.strategy {
        StrategyKind::DifferentialEvolution => (
            Box::new(differential_evolution(config)),
            "Configured: differential evolution".into(),
        ),
        StrategyKind::ParticleSwarm => (
            Box::new(particle_swarm(config, 20)),
            "Configured: PSO".into(),
        ),
        StrategyKind::GradientDescent => (
            Box::new(GradientDescent::new(max_iter, precision)),
            "Configured: gradient descent".into(),
        ),
        StrategyKind::NelderMead => (
            Box::new(NelderMead::new(max_iter, precision)),
            "Configured: Nelder-Mead".into(),
        ),
        StrategyKind::Auto => match n {
            // Global strategies need a finite box to sample from
            _ if !is_bounded(bounds) => (
                Box::new(NelderMead::new(max_iter, precision)),
                format!("Auto: {n} params, not all bounded → Nelder-Mead (local)"),
            ),

            // Small to medium problems (1-8 params) -> PSO
            n if n <= 8 => {
                let pop_size = (10 + n * 3).min(30); // Scale population: 10-30 particles
                (
                    Box::new(particle_swarm(config, pop_size)),
                    format!("Auto: {n} params → PSO (pop={pop_size}, robust for noisy circuits)"),
                )
            }

            // Large problems (9+ params) -> differential evolution
            n => (
                Box::new(differential_evolution(config)),
                format!("Auto: large problem ({n} params) → differential evolution"),
            ),
        },
    };

    (strategy, reason)
}
