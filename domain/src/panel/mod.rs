//! Panel evaluation domain
//!
//! The fixed evaluator roster, the scoring policy, review and decision
//! types, the weighted aggregation algorithm, and the selective re-run
//! planner for revisions.

pub mod aggregate;
pub mod decision;
pub mod evaluator;
pub mod policy;
pub mod rerun;
pub mod review;

pub use aggregate::aggregate;
pub use decision::{Decision, DecisionAggregation, EvaluatorContribution, MinorityReport};
pub use evaluator::Evaluator;
pub use policy::ScoringPolicy;
pub use rerun::{select_reruns, ParentReview};
pub use review::{BlockingIssue, EvaluatorReview, ReviewReconstructError, StoredReview};
