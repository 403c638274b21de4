use super::solvers::SearchCallback;
use crate::error::Result;

/// Iteration result for tracking search progress
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: u32,
    pub params: Vec<f64>,
    pub cost: f64,
}

/// Callback that records each iteration and reports it through `tracing`
pub struct ProgressLog {
    verbose: bool,
    max_iterations: u32,
    iteration_count: u32,
    history: Vec<IterationRecord>,
    param_names: Vec<String>,
}

impl ProgressLog {
    pub fn new(verbose: bool, max_iterations: u32, param_names: Vec<String>) -> Self {
        Self {
            verbose,
            max_iterations,
            iteration_count: 0,
            history: Vec::new(),
            param_names,
        }
    }

    /// Get iteration history
    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<IterationRecord> {
        self.history
    }

    /// Log the end-of-search summary
    pub fn summary(&self, success: bool, stop_reason: &str) {
        tracing::info!(
            success,
            stop_reason,
            iterations = self.history.len(),
            "search finished"
        );

        if let Some(last) = self.history.last() {
            tracing::info!(cost = last.cost, "final cost");
            for (name, value) in self.param_names.iter().zip(&last.params) {
                tracing::info!(parameter = %name, value, "optimal value");
            }
        }
    }
}

impl SearchCallback for ProgressLog {
    fn on_iteration(&mut self, iteration: u32, params: &[f64], cost: f64) -> Result<()> {
        self.iteration_count = iteration;

        self.history.push(IterationRecord {
            iteration,
            params: params.to_vec(),
            cost,
        });

        if self.verbose {
            tracing::info!(iteration, cost, "iteration");
        } else {
            tracing::trace!(iteration, cost, "iteration");
        }

        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.iteration_count >= self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_history_and_stops_at_limit() {
        let mut log = ProgressLog::new(false, 2, vec!["w".into()]);
        log.on_iteration(1, &[1.0], 4.0).unwrap();
        assert!(!log.should_stop());
        log.on_iteration(2, &[0.5], 1.0).unwrap();
        assert!(log.should_stop());

        let history = log.into_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].params, vec![0.5]);
    }
}
