//! Selective re-evaluation planning for revision runs
//!
//! When a proposal comes back revised, only the evaluators whose parent
//! findings warrant another look are re-run; the rest of the panel's
//! reviews are reused as-is.

use super::evaluator::Evaluator;
use super::review::EvaluatorReview;
use std::collections::BTreeSet;

/// One parent-run review as input to re-run selection
#[derive(Debug, Clone)]
pub struct ParentReview {
    pub evaluator: Evaluator,
    pub review: EvaluatorReview,
    /// Whether the revision was flagged as addressing a security concern
    pub security_concern: bool,
}

impl ParentReview {
    pub fn new(review: EvaluatorReview, security_concern: bool) -> Self {
        Self {
            evaluator: review.evaluator,
            review,
            security_concern,
        }
    }
}

/// Select the evaluators that must re-review a revised proposal
///
/// An evaluator is included when any of the following held in the parent
/// run: its confidence was below 0.70, it raised at least one blocking
/// issue, or it is the designated security evaluator and the revision was
/// flagged as security-relevant. Pure and deterministic; identical parent
/// data always yields the identical set.
///
/// # Example
///
/// ```
/// use conclave_domain::panel::{select_reruns, Evaluator, EvaluatorReview, ParentReview};
///
/// let parents = vec![
///     ParentReview::new(EvaluatorReview::new(Evaluator::Architecture, 0.9), false),
///     ParentReview::new(EvaluatorReview::new(Evaluator::Quality, 0.5), false),
/// ];
///
/// let reruns = select_reruns(&parents);
/// assert!(reruns.contains(&Evaluator::Quality));
/// assert!(!reruns.contains(&Evaluator::Architecture));
/// ```
pub fn select_reruns(parent_reviews: &[ParentReview]) -> BTreeSet<Evaluator> {
    parent_reviews
        .iter()
        .filter(|parent| {
            parent.review.confidence < RERUN_CONFIDENCE_THRESHOLD
                || parent.review.has_blocking_issues()
                || (parent.evaluator.is_security() && parent.security_concern)
        })
        .map(|parent| parent.evaluator)
        .collect()
}

/// Parent confidence below this always triggers a re-run.
const RERUN_CONFIDENCE_THRESHOLD: f64 = 0.70;
