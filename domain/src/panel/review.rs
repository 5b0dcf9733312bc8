//! Evaluator review types
//!
//! An [`EvaluatorReview`] is the structured finding one panel member returns
//! for a proposal. [`StoredReview`] is its persisted form; revision runs
//! revive parent reviews through [`StoredReview::reconstruct`], which is the
//! seam where corrupted records are detected.

use super::evaluator::Evaluator;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single blocking issue raised by an evaluator
///
/// `security_critical` is deliberately three-state: `Some(true)` triggers
/// the security veto, while `Some(false)` and `None` are both non-critical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingIssue {
    /// What is blocking, in the evaluator's words
    pub description: String,
    /// Whether the issue is security critical (unset when the evaluator
    /// did not classify it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_critical: Option<bool>,
}

impl BlockingIssue {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            security_critical: None,
        }
    }

    /// Mark the issue as security critical (or explicitly not)
    pub fn with_security_critical(mut self, critical: bool) -> Self {
        self.security_critical = Some(critical);
        self
    }

    /// True only for an explicit `security_critical = true`
    pub fn is_security_critical(&self) -> bool {
        self.security_critical == Some(true)
    }
}

/// One evaluator's scored assessment of a proposal
///
/// # Example
///
/// ```
/// use conclave_domain::panel::{BlockingIssue, Evaluator, EvaluatorReview};
///
/// let review = EvaluatorReview::new(Evaluator::Security, 0.85)
///     .with_strength("Good secret handling")
///     .with_blocking_issue(BlockingIssue::new("Unpinned base image"));
///
/// assert!(review.has_blocking_issues());
/// assert!(!review.has_security_critical_issue());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorReview {
    /// Which panel member produced this review
    pub evaluator: Evaluator,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// What the proposal does well
    pub strengths: Vec<String>,
    /// Reservations that do not block on their own
    pub concerns: Vec<String>,
    /// Suggested changes
    pub recommendations: Vec<String>,
    /// Issues that must be resolved before the proposal can proceed
    pub blocking_issues: Vec<BlockingIssue>,
    /// Free-form effort estimate, if the evaluator gave one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_estimate: Option<String>,
    /// External dependencies that put delivery at risk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_risks: Vec<String>,
}

impl EvaluatorReview {
    /// Create a review with the given confidence, clamped to [0, 1]
    pub fn new(evaluator: Evaluator, confidence: f64) -> Self {
        Self {
            evaluator,
            confidence: confidence.clamp(0.0, 1.0),
            strengths: Vec::new(),
            concerns: Vec::new(),
            recommendations: Vec::new(),
            blocking_issues: Vec::new(),
            effort_estimate: None,
            dependency_risks: Vec::new(),
        }
    }

    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strengths.push(strength.into());
        self
    }

    pub fn with_concern(mut self, concern: impl Into<String>) -> Self {
        self.concerns.push(concern.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_blocking_issue(mut self, issue: BlockingIssue) -> Self {
        self.blocking_issues.push(issue);
        self
    }

    pub fn with_effort_estimate(mut self, estimate: impl Into<String>) -> Self {
        self.effort_estimate = Some(estimate.into());
        self
    }

    pub fn with_dependency_risk(mut self, risk: impl Into<String>) -> Self {
        self.dependency_risks.push(risk.into());
        self
    }

    /// Whether the evaluator raised any blocking issue
    pub fn has_blocking_issues(&self) -> bool {
        !self.blocking_issues.is_empty()
    }

    /// Whether any blocking issue is explicitly security critical
    pub fn has_security_critical_issue(&self) -> bool {
        self.blocking_issues.iter().any(BlockingIssue::is_security_critical)
    }
}

/// Errors surfaced when reviving a persisted review
#[derive(Error, Debug)]
pub enum ReviewReconstructError {
    #[error("Stored review names unknown evaluator: {0}")]
    UnknownEvaluator(String),

    #[error("Stored review payload is malformed: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Stored review evaluator mismatch: record says {record}, payload says {payload}")]
    EvaluatorMismatch { record: String, payload: String },

    #[error("Stored review confidence out of range: {0}")]
    ConfidenceOutOfRange(f64),
}

/// The persisted form of an evaluator review
///
/// The evaluator id is stored alongside the raw payload so selective reuse
/// can plan without deserializing, and so a corrupted payload is detected
/// per record instead of poisoning the whole parent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReview {
    /// Evaluator id as persisted (validated on reconstruction)
    pub evaluator_id: String,
    /// Raw review document
    pub payload: serde_json::Value,
}

impl StoredReview {
    /// Persist a live review
    pub fn from_review(review: &EvaluatorReview) -> Self {
        Self {
            evaluator_id: review.evaluator.as_str().to_string(),
            // A live review always serializes; the fallible path is reading back.
            payload: serde_json::to_value(review).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Revive the stored record into a validated [`EvaluatorReview`]
    pub fn reconstruct(&self) -> Result<EvaluatorReview, ReviewReconstructError> {
        let evaluator: Evaluator = self
            .evaluator_id
            .parse()
            .map_err(|_| ReviewReconstructError::UnknownEvaluator(self.evaluator_id.clone()))?;

        let review: EvaluatorReview = serde_json::from_value(self.payload.clone())?;

        if review.evaluator != evaluator {
            return Err(ReviewReconstructError::EvaluatorMismatch {
                record: evaluator.as_str().to_string(),
                payload: review.evaluator.as_str().to_string(),
            });
        }
        if !(0.0..=1.0).contains(&review.confidence) {
            return Err(ReviewReconstructError::ConfidenceOutOfRange(
                review.confidence,
            ));
        }
        Ok(review)
    }
}
