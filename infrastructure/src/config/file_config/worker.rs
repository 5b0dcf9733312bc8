//! Worker configuration from TOML (`[worker]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [worker]
//! concurrency = 4
//! job_budget_secs = 600
//! phase_budget_secs = 180
//! drain_timeout_secs = 30
//! ```

use conclave_application::PipelineBudgets;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkerConfig {
    /// Maximum number of jobs processed concurrently
    pub concurrency: usize,
    /// Wall-clock ceiling for one job, in seconds
    pub job_budget_secs: u64,
    /// Ceiling for any single pipeline phase, in seconds
    pub phase_budget_secs: u64,
    /// How long shutdown waits for in-flight jobs before giving up
    pub drain_timeout_secs: u64,
}

impl Default for FileWorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            job_budget_secs: 600,
            phase_budget_secs: 180,
            drain_timeout_secs: 30,
        }
    }
}

impl FileWorkerConfig {
    /// Convert the budget fields into the application-layer type
    pub fn to_budgets(&self) -> PipelineBudgets {
        PipelineBudgets::default()
            .with_job_budget(Duration::from_secs(self.job_budget_secs))
            .with_phase_budget(Duration::from_secs(self.phase_budget_secs))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
