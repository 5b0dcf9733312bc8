//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Cannot aggregate an empty review set")]
    EmptyReviews,

    #[error("Unknown evaluator in review set: {0}")]
    UnknownEvaluator(String),

    #[error("Scoring policy weights must sum to 1.0 (got {0})")]
    InvalidWeights(f64),

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Illegal run status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

impl DomainError {
    /// Check if this error is a configuration bug rather than a transient
    /// failure. Configuration bugs should never be retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownEvaluator(_) | DomainError::InvalidWeights(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_evaluator_display() {
        let error = DomainError::UnknownEvaluator("compliance".to_string());
        assert_eq!(
            error.to_string(),
            "Unknown evaluator in review set: compliance"
        );
    }

    #[test]
    fn test_is_configuration() {
        assert!(DomainError::UnknownEvaluator("x".into()).is_configuration());
        assert!(DomainError::InvalidWeights(0.9).is_configuration());
        assert!(!DomainError::EmptyReviews.is_configuration());
    }
}
