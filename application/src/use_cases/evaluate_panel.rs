//! Evaluate Panel use case
//!
//! Drives evaluator calls against the external evaluation service, either
//! fresh for the whole roster or selectively for a revision. Sequential in
//! canonical roster order; holds no state and persists nothing — the only
//! observable side effect is the sequence of service calls.
//!
//! Fresh calls and reuse of a parent's stored record fail differently on
//! purpose: a failed service call aborts the run, while a stored record
//! that no longer validates is logged and skipped. The two paths are kept
//! as distinct [`PanelTask`] variants so the asymmetry stays auditable.

use crate::ports::evaluation_service::{EvaluationError, EvaluationService};
use conclave_domain::{Evaluator, EvaluatorReview, StoredReview};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A panel-phase failure, attributed to the evaluator whose call failed
#[derive(Error, Debug)]
#[error("{evaluator} review failed: {source}")]
pub struct PanelError {
    pub evaluator: Evaluator,
    #[source]
    pub source: EvaluationError,
}

/// One unit of panel work: call the service, or revive a stored record
#[derive(Debug, Clone)]
pub enum PanelTask {
    /// Invoke the evaluation service for this evaluator
    Evaluate(Evaluator),
    /// Reconstruct this evaluator's review from a stored record
    Reuse(Evaluator, StoredReview),
}

impl PanelTask {
    pub fn evaluator(&self) -> Evaluator {
        match self {
            PanelTask::Evaluate(evaluator) => *evaluator,
            PanelTask::Reuse(evaluator, _) => *evaluator,
        }
    }
}

/// Use case for running the evaluator panel against a proposal
pub struct EvaluatePanelUseCase<S: EvaluationService + 'static> {
    service: Arc<S>,
}

impl<S: EvaluationService + 'static> EvaluatePanelUseCase<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    /// Expand a short idea into a full proposal
    pub async fn expand(&self, idea: &str) -> Result<String, EvaluationError> {
        self.service.expand(idea).await
    }

    /// Fresh evaluation: every roster member reviews the proposal
    ///
    /// All-or-nothing — the first service failure aborts and no partial
    /// list is returned.
    pub async fn evaluate_all(&self, proposal: &str) -> Result<Vec<EvaluatorReview>, PanelError> {
        let tasks = Evaluator::roster().into_iter().map(PanelTask::Evaluate).collect();
        self.execute(proposal, tasks).await
    }

    /// Selective evaluation for a revision
    ///
    /// Evaluators in `rerun` are re-invoked (same hard-fail semantics as a
    /// fresh run); the rest reuse the parent's stored record. An evaluator
    /// with no parent record at all is evaluated fresh.
    pub async fn evaluate_selective(
        &self,
        proposal: &str,
        parent_reviews: &[StoredReview],
        rerun: &BTreeSet<Evaluator>,
    ) -> Result<Vec<EvaluatorReview>, PanelError> {
        let tasks = plan_selective(parent_reviews, rerun);
        self.execute(proposal, tasks).await
    }

    /// Run a pre-planned task list in order
    ///
    /// Exposed so the worker can build resume-aware plans; the two shapes
    /// above are the common entry points.
    pub async fn execute(
        &self,
        proposal: &str,
        tasks: Vec<PanelTask>,
    ) -> Result<Vec<EvaluatorReview>, PanelError> {
        let mut reviews = Vec::with_capacity(tasks.len());

        for task in tasks {
            match task {
                PanelTask::Evaluate(evaluator) => {
                    debug!("Requesting {} review", evaluator);
                    let review = self
                        .service
                        .submit(proposal, evaluator)
                        .await
                        .map_err(|source| PanelError { evaluator, source })?;
                    info!(
                        "{} review complete (confidence {:.2})",
                        evaluator, review.confidence
                    );
                    reviews.push(review);
                }
                PanelTask::Reuse(evaluator, stored) => match stored.reconstruct() {
                    Ok(review) => {
                        debug!("Reusing stored {} review", evaluator);
                        reviews.push(review);
                    }
                    Err(e) => {
                        // Reuse corruption is not fatal to the run; the
                        // evaluator is simply absent from this panel.
                        warn!("Skipping stored {} review: {}", evaluator, e);
                    }
                },
            }
        }

        Ok(reviews)
    }
}

/// Plan selective tasks over the canonical roster order
pub fn plan_selective(
    parent_reviews: &[StoredReview],
    rerun: &BTreeSet<Evaluator>,
) -> Vec<PanelTask> {
    Evaluator::roster()
        .into_iter()
        .map(|evaluator| {
            if rerun.contains(&evaluator) {
                return PanelTask::Evaluate(evaluator);
            }
            match parent_reviews
                .iter()
                .find(|stored| stored.evaluator_id == evaluator.as_str())
            {
                Some(stored) => PanelTask::Reuse(evaluator, stored.clone()),
                None => PanelTask::Evaluate(evaluator),
            }
        })
        .collect()
}
