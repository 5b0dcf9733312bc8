//! Process Job use case (the pipeline worker)
//!
//! Consumes one job message end to end: parse, lock the run, walk the
//! canonical steps (expand, the five-review panel phase, aggregate),
//! persist progress incrementally, and decide the acknowledgement.
//!
//! Idempotency comes from two things only: the exclusive run lease (one
//! active processor per run id, system-wide) and terminal statuses being
//! absorbing. Retry limiting is explicitly NOT done here — a failed job
//! returns an error so the caller negatively acknowledges, and the
//! broker's redelivery policy owns everything after that.

use crate::config::PipelineBudgets;
use crate::ports::evaluation_service::{EvaluationError, EvaluationService};
use crate::ports::job_queue::JobMessage;
use crate::ports::metrics::{MetricsSink, NoMetrics};
use crate::ports::run_store::{RunLease, RunStore, StoreError};
use crate::use_cases::evaluate_panel::{
    plan_selective, EvaluatePanelUseCase, PanelError, PanelTask,
};
use conclave_domain::{
    aggregate, select_reruns, Decision, DomainError, Evaluator, EvaluatorReview, ParentReview,
    Run, RunKind, RunStatus, ScoringPolicy, StepName, StepStatus, StoredReview,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors that fail a job (and drive negative acknowledgement)
#[derive(Error, Debug)]
pub enum ProcessJobError {
    #[error("Run store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Proposal expansion failed: {0}")]
    Expand(#[from] EvaluationError),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error("Decision aggregation failed: {0}")]
    Aggregation(#[from] DomainError),

    #[error("Job budget of {budget:?} exhausted before step {step}")]
    JobBudgetExceeded { step: String, budget: Duration },

    #[error("Step {step} exceeded the {budget:?} phase budget")]
    PhaseBudgetExceeded { step: String, budget: Duration },
}

/// How one delivery was handled
///
/// Every variant means "acknowledge"; failures surface as
/// [`ProcessJobError`] and mean "negative-acknowledge".
#[derive(Debug, PartialEq)]
pub enum JobOutcome {
    /// The run finished and a decision was persisted
    Completed { decision: Decision },
    /// The run was already terminal; nothing was touched
    AlreadyTerminal,
    /// The message was malformed poison and was dropped unprocessed
    Dropped { reason: String },
}

/// Use case for processing one job message
pub struct ProcessJobUseCase<S: EvaluationService + 'static, R: RunStore> {
    panel: EvaluatePanelUseCase<S>,
    store: Arc<R>,
    policy: ScoringPolicy,
    budgets: PipelineBudgets,
    metrics: Arc<dyn MetricsSink>,
}

impl<S: EvaluationService + 'static, R: RunStore> ProcessJobUseCase<S, R> {
    pub fn new(service: Arc<S>, store: Arc<R>) -> Self {
        Self {
            panel: EvaluatePanelUseCase::new(service),
            store,
            policy: ScoringPolicy::default(),
            budgets: PipelineBudgets::default(),
            metrics: Arc::new(NoMetrics),
        }
    }

    pub fn with_policy(mut self, policy: ScoringPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_budgets(mut self, budgets: PipelineBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Process one raw message body
    ///
    /// `Ok(_)` means the caller should acknowledge; `Err(_)` means the
    /// run and active step were marked Failed and the caller should
    /// negatively acknowledge.
    pub async fn process(&self, body: &[u8]) -> Result<JobOutcome, ProcessJobError> {
        let message = match JobMessage::parse(body) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed job message: {}", e);
                self.metrics.on_dropped(&e.to_string());
                return Ok(JobOutcome::Dropped {
                    reason: e.to_string(),
                });
            }
        };

        let mut lease = self.acquire_lease(&message).await?;

        if lease.run().is_terminal() {
            info!(
                "Run {} is already {}; acknowledging duplicate delivery",
                message.run_id,
                lease.run().status
            );
            return Ok(JobOutcome::AlreadyTerminal);
        }

        let attempt = lease.record_attempt().await?;
        self.metrics.on_attempt(&message.run_id, attempt);

        if lease.run().status == RunStatus::Queued {
            lease.update_status(RunStatus::Running).await?;
        } else {
            warn!(
                "Run {} was {} instead of queued; resuming anyway",
                message.run_id,
                lease.run().status
            );
            lease.force_status(RunStatus::Running).await?;
        }

        let started = Instant::now();
        match self.run_pipeline(lease.as_mut(), &message, started).await {
            Ok(decision) => {
                lease.update_status(RunStatus::Completed).await?;
                info!("Run {} completed: {}", message.run_id, decision);
                self.metrics.on_completed(&message.run_id, decision);
                Ok(JobOutcome::Completed { decision })
            }
            Err(e) => {
                let text = e.to_string();
                if let Err(mark) = lease.update_status(RunStatus::Failed).await {
                    warn!("Could not mark run {} failed: {}", message.run_id, mark);
                }
                self.metrics.on_failed(&message.run_id, &text);
                Err(e)
            }
        }
    }

    /// Lock the run, creating the record first if the store has never
    /// seen it (audit path: the failure trail must be persisted even for
    /// runs the API boundary lost)
    async fn acquire_lease(
        &self,
        message: &JobMessage,
    ) -> Result<Box<dyn RunLease>, ProcessJobError> {
        match self.store.lock_run(&message.run_id).await {
            Ok(lease) => Ok(lease),
            Err(StoreError::NotFound(_)) => {
                warn!(
                    "Run {} not found in store; creating from message",
                    message.run_id
                );
                let mut run = Run::queued(message.run_id.clone(), message.priority);
                run.kind = message.run_kind;
                match self.store.create_run(run).await {
                    // A concurrent delivery may have won the race; the
                    // lock below serializes us either way.
                    Ok(_) | Err(StoreError::AlreadyExists(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(self.store.lock_run(&message.run_id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Walk the canonical steps for one run
    async fn run_pipeline(
        &self,
        lease: &mut dyn RunLease,
        message: &JobMessage,
        started: Instant,
    ) -> Result<Decision, ProcessJobError> {
        let completed = lease.completed_steps().await?;

        let proposal = self
            .expand_phase(lease, message, started, &completed)
            .await?;
        let reviews = self
            .evaluation_phase(lease, message, started, &completed, &proposal)
            .await?;
        self.aggregation_phase(lease, started, &reviews).await
    }

    /// Phase 1: expand the idea into a proposal (skipped when the step
    /// already committed and the proposal text is persisted)
    async fn expand_phase(
        &self,
        lease: &mut dyn RunLease,
        message: &JobMessage,
        started: Instant,
        completed: &BTreeSet<StepName>,
    ) -> Result<String, ProcessJobError> {
        if completed.contains(&StepName::Expand) {
            if let Some(proposal) = lease.run().proposal.clone() {
                debug!("Expand already completed; reusing persisted proposal");
                return Ok(proposal);
            }
            warn!("Expand marked completed but no proposal persisted; redoing");
        }

        self.check_job_budget(lease, StepName::Expand, started).await?;
        lease
            .upsert_step(StepName::Expand, StepStatus::Running, None)
            .await?;

        let phase_started = Instant::now();
        let proposal = match self.panel.expand(&message.payload.idea).await {
            Ok(proposal) => proposal,
            Err(e) => return Err(self.fail_step(lease, StepName::Expand, e.into()).await),
        };
        self.check_phase_budget(lease, StepName::Expand, phase_started)
            .await?;

        lease.save_proposal(&proposal).await?;
        lease
            .upsert_step(StepName::Expand, StepStatus::Completed, None)
            .await?;
        Ok(proposal)
    }

    /// Phase 2: the five review steps, run as one combined phase through
    /// the panel use case
    async fn evaluation_phase(
        &self,
        lease: &mut dyn RunLease,
        message: &JobMessage,
        started: Instant,
        completed: &BTreeSet<StepName>,
        proposal: &str,
    ) -> Result<Vec<EvaluatorReview>, ProcessJobError> {
        let review_steps: Vec<StepName> = Evaluator::roster()
            .into_iter()
            .map(StepName::Review)
            .collect();
        let own_reviews = lease.reviews().await?;

        let all_done = review_steps.iter().all(|step| completed.contains(step));
        if all_done && own_reviews.len() == review_steps.len() {
            debug!("All review steps already completed; reusing stored reviews");
            return Ok(revive_own_reviews(&own_reviews));
        }

        // Budget violations before the combined phase are attributed to
        // the first step that still has work.
        let lead_step = review_steps
            .iter()
            .copied()
            .find(|step| !completed.contains(step))
            .unwrap_or(review_steps[0]);
        self.check_job_budget(lease, lead_step, started).await?;

        for step in &review_steps {
            if !completed.contains(step) {
                lease.upsert_step(*step, StepStatus::Running, None).await?;
            }
        }

        let tasks = self
            .plan_evaluation(lease, message, completed, &own_reviews)
            .await?;

        let phase_started = Instant::now();
        let reviews = match self.panel.execute(proposal, tasks).await {
            Ok(reviews) => reviews,
            Err(e) => {
                let step = StepName::Review(e.evaluator);
                return Err(self.fail_step(lease, step, e.into()).await);
            }
        };
        self.check_phase_budget(lease, lead_step, phase_started)
            .await?;

        // Persist only reviews this run does not already hold; reviews
        // reused from the parent are copied into this run's record.
        let already: BTreeSet<&str> = own_reviews
            .iter()
            .map(|stored| stored.evaluator_id.as_str())
            .collect();
        for review in &reviews {
            if !already.contains(review.evaluator.as_str()) {
                lease.persist_review(review).await?;
            }
        }

        for step in &review_steps {
            if !completed.contains(step) {
                lease.upsert_step(*step, StepStatus::Completed, None).await?;
            }
        }
        Ok(reviews)
    }

    /// Phase 3: aggregate reviews into the decision
    async fn aggregation_phase(
        &self,
        lease: &mut dyn RunLease,
        started: Instant,
        reviews: &[EvaluatorReview],
    ) -> Result<Decision, ProcessJobError> {
        self.check_job_budget(lease, StepName::AggregateDecision, started)
            .await?;
        lease
            .upsert_step(StepName::AggregateDecision, StepStatus::Running, None)
            .await?;

        let phase_started = Instant::now();
        let aggregation = match aggregate(reviews, &self.policy) {
            Ok(aggregation) => aggregation,
            Err(e) => {
                return Err(self
                    .fail_step(lease, StepName::AggregateDecision, e.into())
                    .await)
            }
        };
        self.check_phase_budget(lease, StepName::AggregateDecision, phase_started)
            .await?;

        lease.persist_decision(&aggregation).await?;
        lease
            .upsert_step(StepName::AggregateDecision, StepStatus::Completed, None)
            .await?;
        Ok(aggregation.decision)
    }

    /// Build the panel task list: fresh for initial runs, selective for
    /// revisions, with this run's own completed review steps always
    /// reused (resume after a crash)
    async fn plan_evaluation(
        &self,
        lease: &mut dyn RunLease,
        message: &JobMessage,
        completed: &BTreeSet<StepName>,
        own_reviews: &[StoredReview],
    ) -> Result<Vec<PanelTask>, ProcessJobError> {
        let kind = lease.run().kind;
        if message.run_kind != kind {
            warn!(
                "Message says {} but run {} is {}; trusting the store",
                message.run_kind.as_str(),
                lease.run().id,
                kind.as_str()
            );
        }

        let mut tasks = match kind {
            RunKind::Initial => Evaluator::roster()
                .into_iter()
                .map(PanelTask::Evaluate)
                .collect::<Vec<_>>(),
            RunKind::Revision => {
                let parent_stored = lease.parent_reviews().await?;
                let parents: Vec<ParentReview> = parent_stored
                    .iter()
                    .filter_map(|stored| match stored.reconstruct() {
                        Ok(review) => Some(ParentReview::new(
                            review,
                            message.payload.security_concern,
                        )),
                        Err(e) => {
                            // A record that cannot vote on inclusion falls
                            // through to the reuse path, where it is
                            // skipped with its own warning.
                            warn!("Ignoring corrupt parent record for re-run selection: {}", e);
                            None
                        }
                    })
                    .collect();
                let rerun = select_reruns(&parents);
                info!(
                    "Revision {}: re-running {} of {} evaluators",
                    lease.run().id,
                    rerun.len(),
                    Evaluator::roster().len()
                );
                plan_selective(&parent_stored, &rerun)
            }
        };

        for task in tasks.iter_mut() {
            let evaluator = task.evaluator();
            if completed.contains(&StepName::Review(evaluator)) {
                if let Some(own) = own_reviews
                    .iter()
                    .find(|stored| stored.evaluator_id == evaluator.as_str())
                {
                    *task = PanelTask::Reuse(evaluator, own.clone());
                }
            }
        }
        Ok(tasks)
    }

    /// Record a step failure (best effort) and hand the error back
    async fn fail_step(
        &self,
        lease: &mut dyn RunLease,
        step: StepName,
        error: ProcessJobError,
    ) -> ProcessJobError {
        if let Err(e) = lease
            .upsert_step(step, StepStatus::Failed, Some(error.to_string()))
            .await
        {
            warn!("Could not record {} failure: {}", step, e);
        }
        error
    }

    async fn check_job_budget(
        &self,
        lease: &mut dyn RunLease,
        step: StepName,
        started: Instant,
    ) -> Result<(), ProcessJobError> {
        if started.elapsed() > self.budgets.job_budget {
            let error = ProcessJobError::JobBudgetExceeded {
                step: step.as_str(),
                budget: self.budgets.job_budget,
            };
            return Err(self.fail_step(lease, step, error).await);
        }
        Ok(())
    }

    async fn check_phase_budget(
        &self,
        lease: &mut dyn RunLease,
        step: StepName,
        phase_started: Instant,
    ) -> Result<(), ProcessJobError> {
        if phase_started.elapsed() > self.budgets.phase_budget {
            let error = ProcessJobError::PhaseBudgetExceeded {
                step: step.as_str(),
                budget: self.budgets.phase_budget,
            };
            return Err(self.fail_step(lease, step, error).await);
        }
        Ok(())
    }
}

/// Revive this run's own stored reviews, skipping corrupt records the
/// same way parent reuse does
fn revive_own_reviews(stored: &[StoredReview]) -> Vec<EvaluatorReview> {
    stored
        .iter()
        .filter_map(|record| match record.reconstruct() {
            Ok(review) => Some(review),
            Err(e) => {
                warn!("Skipping corrupt stored review: {}", e);
                None
            }
        })
        .collect()
}
