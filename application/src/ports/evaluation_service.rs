//! Evaluation service port
//!
//! Defines the interface to the external service that expands ideas into
//! proposals and produces evaluator reviews. The shape of a remote failure
//! (auth, rate limit, network) is opaque here; the pipeline only cares
//! that the call failed.

use async_trait::async_trait;
use conclave_domain::{Evaluator, EvaluatorReview};
use thiserror::Error;

/// Errors that can occur when calling the evaluation service
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Evaluation request failed: {0}")]
    RequestFailed(String),

    #[error("Evaluation service unavailable: {0}")]
    Unavailable(String),

    #[error("Evaluation request timed out")]
    Timeout,

    #[error("Malformed evaluation response: {0}")]
    MalformedResponse(String),
}

/// Gateway to the external evaluation service
///
/// This port defines how the application layer reaches the remote model
/// API. Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait EvaluationService: Send + Sync {
    /// Expand a short idea into a full proposal
    async fn expand(&self, idea: &str) -> Result<String, EvaluationError>;

    /// Ask one evaluator to review a proposal
    ///
    /// Any error is fatal to this call; retry policy lives with the
    /// service adapter, not the pipeline.
    async fn submit(
        &self,
        proposal: &str,
        evaluator: Evaluator,
    ) -> Result<EvaluatorReview, EvaluationError>;
}
