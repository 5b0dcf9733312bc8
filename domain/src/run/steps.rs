//! Canonical pipeline steps and per-step progress
//!
//! Every run walks the same fixed, ordered step list: expand, one review
//! step per evaluator, then the decision aggregation. The list and its
//! order are a compatibility surface for anything that reads persisted
//! progress, so both are derived in exactly one place.

use crate::panel::evaluator::Evaluator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of the canonical pipeline
///
/// Serializes as its persisted string form (`expand`, `review_security`,
/// ...) so that stored progress rows read back under the canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepName {
    /// Expand the raw idea into a full proposal
    Expand,
    /// One evaluator's review of the proposal
    Review(Evaluator),
    /// Aggregate all reviews into the decision
    AggregateDecision,
}

impl StepName {
    /// The full canonical step list, in execution order
    pub fn canonical() -> [StepName; 7] {
        let [a, s, p, f, q] = Evaluator::roster();
        [
            StepName::Expand,
            StepName::Review(a),
            StepName::Review(s),
            StepName::Review(p),
            StepName::Review(f),
            StepName::Review(q),
            StepName::AggregateDecision,
        ]
    }

    /// Stable persisted name (`expand`, `review_<evaluator>`,
    /// `aggregate_decision`)
    pub fn as_str(&self) -> String {
        match self {
            StepName::Expand => "expand".to_string(),
            StepName::Review(evaluator) => format!("review_{}", evaluator),
            StepName::AggregateDecision => "aggregate_decision".to_string(),
        }
    }

    /// Position in the canonical list (0-indexed)
    pub fn order_index(&self) -> usize {
        match self {
            StepName::Expand => 0,
            StepName::Review(evaluator) => 1 + evaluator.roster_index(),
            StepName::AggregateDecision => 6,
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expand" => Ok(StepName::Expand),
            "aggregate_decision" => Ok(StepName::AggregateDecision),
            other => match other.strip_prefix("review_") {
                Some(id) => id
                    .parse::<Evaluator>()
                    .map(StepName::Review)
                    .map_err(|e| format!("Unknown step: {} ({})", other, e)),
                None => Err(format!("Unknown step: {}", other)),
            },
        }
    }
}

impl Serialize for StepName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

/// Persisted progress of one (run, step) pair
///
/// Upserts are keyed by (run, step). Entering Completed clears any prior
/// error text; entering Failed sets it. Retries re-enter Running, which
/// also clears the previous attempt's error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepProgress {
    pub step: StepName,
    pub order_index: usize,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StepProgress {
    /// Fresh pending progress for one step
    pub fn pending(step: StepName) -> Self {
        Self {
            step,
            order_index: step.order_index(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Mark the step running (also used by retries re-entering the step)
    pub fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.error = None;
    }

    /// Mark the step completed, clearing any prior error
    pub fn mark_completed(&mut self) {
        self.status = StepStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.error = None;
    }

    /// Mark the step failed with the error text
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_list_is_seven_steps() {
        let steps = StepName::canonical();
        assert_eq!(steps.len(), 7);

        let names: Vec<String> = steps.iter().map(StepName::as_str).collect();
        assert_eq!(
            names,
            vec![
                "expand",
                "review_architecture",
                "review_security",
                "review_performance",
                "review_feasibility",
                "review_quality",
                "aggregate_decision",
            ]
        );
    }

    #[test]
    fn test_order_indices_match_position() {
        for (position, step) in StepName::canonical().iter().enumerate() {
            assert_eq!(step.order_index(), position, "{}", step);
        }
    }

    #[test]
    fn test_roundtrip_parse() {
        for step in StepName::canonical() {
            let parsed: StepName = step.as_str().parse().unwrap();
            assert_eq!(parsed, step);
        }
    }

    #[test]
    fn test_serde_uses_persisted_names() {
        let json = serde_json::to_string(&StepName::Review(Evaluator::Security)).unwrap();
        assert_eq!(json, "\"review_security\"");

        let parsed: StepName = serde_json::from_str("\"aggregate_decision\"").unwrap();
        assert_eq!(parsed, StepName::AggregateDecision);
    }

    #[test]
    fn test_parse_unknown_step() {
        assert!("deploy".parse::<StepName>().is_err());
        assert!("review_compliance".parse::<StepName>().is_err());
    }

    #[test]
    fn test_completed_clears_error() {
        let mut progress = StepProgress::pending(StepName::Expand);
        progress.mark_running();
        progress.mark_failed("timeout");
        assert_eq!(progress.status, StepStatus::Failed);
        assert_eq!(progress.error.as_deref(), Some("timeout"));

        // Retry path: re-entering Running clears the old error, and
        // Completed keeps it cleared.
        progress.mark_running();
        assert!(progress.error.is_none());
        progress.mark_completed();
        assert_eq!(progress.status, StepStatus::Completed);
        assert!(progress.error.is_none());
        assert!(progress.finished_at.is_some());
    }

    #[test]
    fn test_failed_sets_error() {
        let mut progress = StepProgress::pending(StepName::AggregateDecision);
        progress.mark_running();
        progress.mark_failed("empty review set");
        assert_eq!(progress.error.as_deref(), Some("empty review set"));
    }
}
