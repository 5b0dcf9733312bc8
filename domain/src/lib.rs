//! Domain layer for conclave
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure concerns.
//!
//! # Core Concepts
//!
//! ## Panel
//!
//! Every proposal is scored by the same five-member evaluator panel. The
//! panel's weighted confidences aggregate into a single approve / revise /
//! reject decision, with a security veto and minority reports for
//! dissenting evaluators.
//!
//! ## Run
//!
//! One end-to-end pipeline execution (initial or revision) tracked through
//! a fixed seven-step sequence, with forward-only status transitions.

pub mod core;
pub mod panel;
pub mod run;

// Re-export commonly used types
pub use crate::core::error::DomainError;
pub use panel::{
    aggregate, select_reruns, BlockingIssue, Decision, DecisionAggregation, Evaluator,
    EvaluatorContribution, EvaluatorReview, MinorityReport, ParentReview, ReviewReconstructError,
    ScoringPolicy, StoredReview,
};
pub use run::{
    Priority, Run, RunId, RunKind, RunStatus, StepName, StepProgress, StepStatus,
};
