//! Panel scoring configuration from TOML (`[panel]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [panel]
//! approve_threshold = 0.85
//!
//! [panel.weights]
//! architecture = 0.30
//! security = 0.30
//! performance = 0.10
//! feasibility = 0.20
//! quality = 0.10
//! ```

use super::super::ConfigValidationError;
use conclave_domain::{Evaluator, ScoringPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scoring policy overrides for the evaluator panel
///
/// An empty `weights` table means the built-in weights; a non-empty table
/// must name known evaluators and sum to 1.0. Unset thresholds keep the
/// built-in values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePanelConfig {
    /// Per-evaluator weight overrides, keyed by evaluator id
    pub weights: BTreeMap<String, f64>,
    /// Weighted confidence at or above this approves
    pub approve_threshold: Option<f64>,
    /// Weighted confidence at or above this (but below approve) revises
    pub revise_threshold: Option<f64>,
    /// Confidence below this marks an evaluator as a dissenting voice
    pub minority_threshold: Option<f64>,
}

impl FilePanelConfig {
    /// Build the scoring policy, validating weight keys and the sum
    pub fn to_policy(&self) -> Result<ScoringPolicy, ConfigValidationError> {
        let mut policy = if self.weights.is_empty() {
            ScoringPolicy::default()
        } else {
            let mut weights = BTreeMap::new();
            for (id, weight) in &self.weights {
                let evaluator: Evaluator = id.parse().map_err(|_| {
                    ConfigValidationError::UnknownEvaluator(id.clone())
                })?;
                weights.insert(evaluator, *weight);
            }
            ScoringPolicy::with_weights(weights)?
        };

        if let Some(threshold) = self.approve_threshold {
            policy.approve_threshold = threshold;
        }
        if let Some(threshold) = self.revise_threshold {
            policy.revise_threshold = threshold;
        }
        if let Some(threshold) = self.minority_threshold {
            policy.minority_threshold = threshold;
        }
        Ok(policy)
    }
}
