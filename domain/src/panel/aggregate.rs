//! Weighted panel aggregation
//!
//! Turns a set of evaluator reviews into a single decision: weighted
//! confidence, threshold banding, the security veto, and minority-report
//! synthesis. Pure and deterministic; persistence happens elsewhere.

use super::decision::{Decision, DecisionAggregation, EvaluatorContribution, MinorityReport};
use super::policy::{ScoringPolicy, WEIGHT_EPSILON};
use super::review::EvaluatorReview;
use crate::core::error::DomainError;

/// Aggregate panel reviews into a decision
///
/// Fails on an empty review set, and on any review naming an evaluator the
/// policy does not weight (a configuration bug, never retryable).
///
/// Banding is lower-inclusive with a small epsilon so that a score that is
/// mathematically exactly on a threshold is never pushed down a band by
/// float accumulation error.
///
/// # Example
///
/// ```
/// use conclave_domain::panel::{aggregate, Evaluator, EvaluatorReview, ScoringPolicy};
///
/// let reviews: Vec<_> = Evaluator::roster()
///     .into_iter()
///     .map(|e| EvaluatorReview::new(e, 0.9))
///     .collect();
///
/// let result = aggregate(&reviews, &ScoringPolicy::default()).unwrap();
/// assert!(result.decision.is_approve());
/// ```
pub fn aggregate(
    reviews: &[EvaluatorReview],
    policy: &ScoringPolicy,
) -> Result<DecisionAggregation, DomainError> {
    if reviews.is_empty() {
        return Err(DomainError::EmptyReviews);
    }
    policy.validate()?;

    let mut breakdown = Vec::with_capacity(reviews.len());
    let mut weighted_confidence = 0.0_f64;

    for review in reviews {
        let weight = policy
            .weight(review.evaluator)
            .ok_or_else(|| DomainError::UnknownEvaluator(review.evaluator.to_string()))?;
        let weighted = weight * review.confidence;
        weighted_confidence += weighted;
        breakdown.push(EvaluatorContribution {
            evaluator: review.evaluator,
            weight,
            confidence: review.confidence,
            weighted,
        });
    }

    // Float-precision safety net; individual confidences are already in range.
    let weighted_confidence = weighted_confidence.clamp(0.0, 1.0);

    let mut decision = band_for(weighted_confidence, policy);

    // Security veto: an explicit security-critical blocking issue from the
    // designated security evaluator downgrades Approve to Revise. It never
    // touches Revise or Reject, and never upgrades.
    if decision == Decision::Approve && security_veto_applies(reviews) {
        decision = Decision::Revise;
    }

    let minority_reports = if decision == Decision::Approve {
        synthesize_minority_reports(reviews, policy)
    } else {
        Vec::new()
    };

    Ok(DecisionAggregation {
        weighted_confidence,
        decision,
        breakdown,
        minority_reports,
    })
}

/// Map a weighted confidence onto a decision band (lower-inclusive edges)
fn band_for(weighted: f64, policy: &ScoringPolicy) -> Decision {
    if weighted >= policy.approve_threshold - WEIGHT_EPSILON {
        Decision::Approve
    } else if weighted >= policy.revise_threshold - WEIGHT_EPSILON {
        Decision::Revise
    } else {
        Decision::Reject
    }
}

fn security_veto_applies(reviews: &[EvaluatorReview]) -> bool {
    reviews
        .iter()
        .filter(|r| r.evaluator.is_security())
        .any(EvaluatorReview::has_security_critical_issue)
}

/// Capture every dissenting evaluator's reasoning
///
/// Dissent is low confidence (below the minority threshold) or any blocking
/// issue. Callers only emit these when the overall decision is Approve.
fn synthesize_minority_reports(
    reviews: &[EvaluatorReview],
    policy: &ScoringPolicy,
) -> Vec<MinorityReport> {
    reviews
        .iter()
        .filter(|r| r.confidence < policy.minority_threshold || r.has_blocking_issues())
        .map(|review| {
            let blocking_summary = review
                .blocking_issues
                .iter()
                .map(|issue| issue.description.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let mitigation = if review.has_blocking_issues() {
                format!(
                    "Resolve the blocking findings from the {} review before shipping",
                    review.evaluator
                )
            } else {
                format!(
                    "Track the {} concerns; confidence was {:.2}",
                    review.evaluator, review.confidence
                )
            };

            MinorityReport {
                evaluator: review.evaluator,
                confidence: review.confidence,
                strengths: review.strengths.clone(),
                concerns: review.concerns.clone(),
                blocking_summary,
                mitigation,
            }
        })
        .collect()
}
