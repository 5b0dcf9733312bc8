//! Run store port
//!
//! Persistence boundary for runs, step progress, reviews, and decisions.
//! All mutation happens through an exclusive [`RunLease`]: holding the
//! lease is the pipeline's sole serialization point, so duplicate or
//! concurrent deliveries of the same run id cannot race. On a SQL store
//! the lease maps onto `SELECT ... FOR UPDATE`; the in-memory adapter
//! backs it with a per-run mutex.

use async_trait::async_trait;
use conclave_domain::{
    DecisionAggregation, EvaluatorReview, Run, RunId, RunStatus, StepName, StepProgress,
    StepStatus, StoredReview,
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised by the run store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Run not found: {0}")]
    NotFound(RunId),

    #[error("Run already exists: {0}")]
    AlreadyExists(RunId),

    #[error("Duplicate review for run {run_id}, evaluator {evaluator}")]
    DuplicateReview { run_id: RunId, evaluator: String },

    #[error("Illegal status transition persisted for run {run_id}: {detail}")]
    IllegalTransition { run_id: RunId, detail: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Store for run records and everything hanging off them
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a new run record (API boundary, or the worker's audit path
    /// when a message arrives for a run the store has never seen)
    async fn create_run(&self, run: Run) -> Result<Run, StoreError>;

    /// Read a run without locking it (status polling)
    async fn get_run(&self, id: &RunId) -> Result<Run, StoreError>;

    /// Acquire the exclusive lease on one run
    ///
    /// Blocks until any other holder releases it. The lease is held for
    /// the whole job and released on drop.
    async fn lock_run(&self, id: &RunId) -> Result<Box<dyn RunLease>, StoreError>;
}

/// Exclusive, per-run handle used by the pipeline worker
///
/// Each mutation commits individually; a crash mid-job leaves whatever was
/// last persisted, and reprocessing resumes from there.
#[async_trait]
pub trait RunLease: Send {
    /// The run record as of the last persisted state
    fn run(&self) -> &Run;

    /// Apply a legal status transition
    async fn update_status(&mut self, status: RunStatus) -> Result<(), StoreError>;

    /// Set the status without legality checks (crash-recovery path; the
    /// caller is expected to have warned already)
    async fn force_status(&mut self, status: RunStatus) -> Result<(), StoreError>;

    /// Bump the durable delivery-attempt counter, returning the new value
    async fn record_attempt(&mut self) -> Result<u32, StoreError>;

    /// Upsert one step's progress, keyed by (run, step)
    ///
    /// Transitions into Completed clear prior error text; transitions into
    /// Failed set it; re-entering Running clears it.
    async fn upsert_step(
        &mut self,
        step: StepName,
        status: StepStatus,
        error: Option<String>,
    ) -> Result<StepProgress, StoreError>;

    /// Steps of this run already marked Completed
    async fn completed_steps(&self) -> Result<BTreeSet<StepName>, StoreError>;

    /// Persist the expanded proposal text onto the run record
    async fn save_proposal(&mut self, proposal: &str) -> Result<(), StoreError>;

    /// Persist one evaluator review for this run
    ///
    /// Fails with [`StoreError::DuplicateReview`] if a review from the
    /// same evaluator is already stored for this run.
    async fn persist_review(&mut self, review: &EvaluatorReview) -> Result<StoredReview, StoreError>;

    /// Reviews already persisted for this run
    async fn reviews(&self) -> Result<Vec<StoredReview>, StoreError>;

    /// Reviews persisted for this run's parent (empty when there is no
    /// parent); read-only, no lock is taken on the parent
    async fn parent_reviews(&self) -> Result<Vec<StoredReview>, StoreError>;

    /// Persist the aggregated decision for this run
    async fn persist_decision(&mut self, decision: &DecisionAggregation) -> Result<(), StoreError>;
}
