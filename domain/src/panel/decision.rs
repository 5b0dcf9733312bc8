//! Aggregated panel decision types

use super::evaluator::Evaluator;
use serde::{Deserialize, Serialize};

/// Final outcome for a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The proposal can proceed as written
    Approve,
    /// The proposal needs another pass before it can proceed
    Revise,
    /// The proposal should not proceed
    Reject,
}

impl Decision {
    /// Stable identifier used in persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Revise => "revise",
            Decision::Reject => "reject",
        }
    }

    pub fn is_approve(&self) -> bool {
        matches!(self, Decision::Approve)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One evaluator's share of the weighted score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorContribution {
    pub evaluator: Evaluator,
    /// Policy weight applied to this evaluator
    pub weight: f64,
    /// Raw confidence from the review
    pub confidence: f64,
    /// `weight * confidence`
    pub weighted: f64,
}

/// A dissenting evaluator's reasoning, captured when the panel approves
/// despite that evaluator's low confidence or blocking findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorityReport {
    pub evaluator: Evaluator,
    pub confidence: f64,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    /// Blocking issue texts joined into one summary
    pub blocking_summary: String,
    /// Suggested follow-up for the approving owner
    pub mitigation: String,
}

/// The aggregated result of a full panel evaluation
///
/// Produced by [`aggregate`](super::aggregate::aggregate); carries the
/// weighted score, the decision, the per-evaluator breakdown, and any
/// minority reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionAggregation {
    /// Weighted confidence across the panel, in [0, 1]
    pub weighted_confidence: f64,
    /// Final decision after thresholds and the security veto
    pub decision: Decision,
    /// Per-evaluator breakdown, in canonical roster order
    pub breakdown: Vec<EvaluatorContribution>,
    /// Dissenting voices (only present on Approve)
    pub minority_reports: Vec<MinorityReport>,
}

impl DecisionAggregation {
    /// Whether any evaluator filed a minority report
    pub fn has_minority_dissent(&self) -> bool {
        !self.minority_reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_persisted_strings() {
        assert_eq!(Decision::Approve.as_str(), "approve");
        assert_eq!(Decision::Revise.as_str(), "revise");
        assert_eq!(Decision::Reject.as_str(), "reject");
    }

    #[test]
    fn test_decision_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Decision::Revise).unwrap(),
            "\"revise\""
        );
        let parsed: Decision = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(parsed, Decision::Reject);
    }

    #[test]
    fn test_display() {
        assert_eq!(Decision::Approve.to_string(), "approve");
    }
}
