//! Scoring policy for the evaluator panel
//!
//! Weights and decision thresholds live here so that aggregation stays a
//! pure function over (reviews, policy).

use super::evaluator::Evaluator;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for floating point comparisons on weights and thresholds.
pub(crate) const WEIGHT_EPSILON: f64 = 1e-9;

/// Weights and thresholds used to aggregate panel reviews
///
/// Weights are keyed by evaluator; aggregation fails if a review names an
/// evaluator the policy does not weight. The default policy weights the
/// architecture and security evaluators highest, and weights always sum
/// to 1.0.
///
/// # Example
///
/// ```
/// use conclave_domain::panel::{Evaluator, ScoringPolicy};
///
/// let policy = ScoringPolicy::default();
/// assert_eq!(policy.weight(Evaluator::Architecture), Some(0.25));
/// policy.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Per-evaluator weights
    pub weights: BTreeMap<Evaluator, f64>,
    /// Weighted confidence at or above this approves
    pub approve_threshold: f64,
    /// Weighted confidence at or above this (but below approve) revises
    pub revise_threshold: f64,
    /// Confidence below this marks an evaluator as a dissenting voice
    pub minority_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (Evaluator::Architecture, 0.25),
            (Evaluator::Security, 0.25),
            (Evaluator::Performance, 0.15),
            (Evaluator::Feasibility, 0.20),
            (Evaluator::Quality, 0.15),
        ]);
        Self {
            weights,
            approve_threshold: 0.80,
            revise_threshold: 0.60,
            minority_threshold: 0.70,
        }
    }
}

impl ScoringPolicy {
    /// Build a policy with custom weights, validated on construction
    pub fn with_weights(weights: BTreeMap<Evaluator, f64>) -> Result<Self, DomainError> {
        let policy = Self {
            weights,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Weight assigned to one evaluator, if the policy covers it
    pub fn weight(&self, evaluator: Evaluator) -> Option<f64> {
        self.weights.get(&evaluator).copied()
    }

    /// Check the weight-sum invariant
    pub fn validate(&self) -> Result<(), DomainError> {
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(DomainError::InvalidWeights(sum));
        }
        Ok(())
    }
}
