//! Pipeline time budgets
//!
//! Two independent ceilings: a per-job wall clock checked before each
//! phase starts, and a smaller per-phase ceiling checked right after a
//! phase's work returns. Both checks are cooperative; nothing is
//! preempted mid-phase.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time budgets enforced by the pipeline worker
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineBudgets {
    /// Wall-clock ceiling for a whole job
    pub job_budget: Duration,
    /// Ceiling for any single phase
    pub phase_budget: Duration,
}

impl Default for PipelineBudgets {
    fn default() -> Self {
        Self {
            job_budget: Duration::from_secs(600),
            phase_budget: Duration::from_secs(180),
        }
    }
}

impl PipelineBudgets {
    pub fn with_job_budget(mut self, budget: Duration) -> Self {
        self.job_budget = budget;
        self
    }

    pub fn with_phase_budget(mut self, budget: Duration) -> Self {
        self.phase_budget = budget;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let budgets = PipelineBudgets::default();
        assert_eq!(budgets.job_budget, Duration::from_secs(600));
        assert_eq!(budgets.phase_budget, Duration::from_secs(180));
    }

    #[test]
    fn test_builder() {
        let budgets = PipelineBudgets::default()
            .with_job_budget(Duration::from_secs(60))
            .with_phase_budget(Duration::from_secs(10));
        assert_eq!(budgets.job_budget, Duration::from_secs(60));
        assert_eq!(budgets.phase_budget, Duration::from_secs(10));
    }
}
