//! In-memory run store adapter
//!
//! Backs the run store port for tests and single-process deployments.
//! The exclusive lease maps onto a per-run `tokio::sync::Mutex`: what a
//! SQL adapter gets from `SELECT ... FOR UPDATE`, this adapter gets from
//! holding the owned guard for the lifetime of the lease.

use async_trait::async_trait;
use conclave_application::{RunLease, RunStore, StoreError};
use conclave_domain::{
    DecisionAggregation, EvaluatorReview, Run, RunId, RunStatus, StepName, StepProgress,
    StepStatus, StoredReview,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

#[derive(Clone)]
struct RunRecord {
    run: Run,
    steps: BTreeMap<String, StepProgress>,
    reviews: Vec<StoredReview>,
    decision: Option<DecisionAggregation>,
}

impl RunRecord {
    fn new(run: Run) -> Self {
        Self {
            run,
            steps: BTreeMap::new(),
            reviews: Vec::new(),
            decision: None,
        }
    }
}

struct RecordCell {
    data: Mutex<RunRecord>,
    lease: Arc<tokio::sync::Mutex<()>>,
}

impl RecordCell {
    fn new(run: Run) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(RunRecord::new(run)),
            lease: Arc::new(tokio::sync::Mutex::new(())),
        })
    }
}

/// In-process run store
#[derive(Clone, Default)]
pub struct MemoryRunStore {
    records: Arc<Mutex<HashMap<RunId, Arc<RecordCell>>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, id: &RunId) -> Result<Arc<RecordCell>, StoreError> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// The persisted decision for a run, if it has one
    ///
    /// Adapter-specific accessor (the port only exposes run status); used
    /// by the demo flow and by tests.
    pub fn decision(&self, id: &RunId) -> Option<DecisionAggregation> {
        let cell = self.cell(id).ok()?;
        let data = cell.data.lock().unwrap();
        data.decision.clone()
    }

    /// Step progress rows for a run, in canonical order
    pub fn steps(&self, id: &RunId) -> Vec<StepProgress> {
        let Ok(cell) = self.cell(id) else {
            return Vec::new();
        };
        let data = cell.data.lock().unwrap();
        let mut steps: Vec<StepProgress> = data.steps.values().cloned().collect();
        steps.sort_by_key(|p| p.order_index);
        steps
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, run: Run) -> Result<Run, StoreError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&run.id) {
            return Err(StoreError::AlreadyExists(run.id));
        }
        debug!("Creating run {}", run.id);
        records.insert(run.id.clone(), RecordCell::new(run.clone()));
        Ok(run)
    }

    async fn get_run(&self, id: &RunId) -> Result<Run, StoreError> {
        let cell = self.cell(id)?;
        let data = cell.data.lock().unwrap();
        Ok(data.run.clone())
    }

    async fn lock_run(&self, id: &RunId) -> Result<Box<dyn RunLease>, StoreError> {
        let cell = self.cell(id)?;
        let guard = Arc::clone(&cell.lease).lock_owned().await;
        // Re-read under the lease; a previous holder may have mutated the
        // record between the map lookup and the lock.
        let run = cell.data.lock().unwrap().run.clone();
        Ok(Box::new(MemoryRunLease {
            records: Arc::clone(&self.records),
            cell,
            run,
            _guard: guard,
        }))
    }
}

/// Exclusive handle on one run, released on drop
struct MemoryRunLease {
    records: Arc<Mutex<HashMap<RunId, Arc<RecordCell>>>>,
    cell: Arc<RecordCell>,
    run: Run,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryRunLease {
    fn write_back(&self) {
        self.cell.data.lock().unwrap().run = self.run.clone();
    }
}

#[async_trait]
impl RunLease for MemoryRunLease {
    fn run(&self) -> &Run {
        &self.run
    }

    async fn update_status(&mut self, status: RunStatus) -> Result<(), StoreError> {
        self.run
            .transition(status)
            .map_err(|e| StoreError::IllegalTransition {
                run_id: self.run.id.clone(),
                detail: e.to_string(),
            })?;
        self.write_back();
        Ok(())
    }

    async fn force_status(&mut self, status: RunStatus) -> Result<(), StoreError> {
        self.run.force_status(status);
        self.write_back();
        Ok(())
    }

    async fn record_attempt(&mut self) -> Result<u32, StoreError> {
        self.run.retry_count += 1;
        self.write_back();
        Ok(self.run.retry_count)
    }

    async fn upsert_step(
        &mut self,
        step: StepName,
        status: StepStatus,
        error: Option<String>,
    ) -> Result<StepProgress, StoreError> {
        let mut data = self.cell.data.lock().unwrap();
        let progress = data
            .steps
            .entry(step.as_str())
            .or_insert_with(|| StepProgress::pending(step));
        match status {
            StepStatus::Running => progress.mark_running(),
            StepStatus::Completed => progress.mark_completed(),
            StepStatus::Failed => progress.mark_failed(error.unwrap_or_default()),
            StepStatus::Pending => {}
        }
        Ok(progress.clone())
    }

    async fn completed_steps(&self) -> Result<BTreeSet<StepName>, StoreError> {
        let data = self.cell.data.lock().unwrap();
        Ok(data
            .steps
            .values()
            .filter(|p| p.status == StepStatus::Completed)
            .map(|p| p.step)
            .collect())
    }

    async fn save_proposal(&mut self, proposal: &str) -> Result<(), StoreError> {
        self.run.proposal = Some(proposal.to_string());
        self.write_back();
        Ok(())
    }

    async fn persist_review(
        &mut self,
        review: &EvaluatorReview,
    ) -> Result<StoredReview, StoreError> {
        let mut data = self.cell.data.lock().unwrap();
        if data
            .reviews
            .iter()
            .any(|stored| stored.evaluator_id == review.evaluator.as_str())
        {
            return Err(StoreError::DuplicateReview {
                run_id: self.run.id.clone(),
                evaluator: review.evaluator.to_string(),
            });
        }
        let stored = StoredReview::from_review(review);
        data.reviews.push(stored.clone());
        Ok(stored)
    }

    async fn reviews(&self) -> Result<Vec<StoredReview>, StoreError> {
        let data = self.cell.data.lock().unwrap();
        Ok(data.reviews.clone())
    }

    async fn parent_reviews(&self) -> Result<Vec<StoredReview>, StoreError> {
        let Some(parent_id) = &self.run.parent_id else {
            return Ok(Vec::new());
        };
        let cell = {
            let records = self.records.lock().unwrap();
            records.get(parent_id).cloned()
        };
        // No lease on the parent: terminal runs are immutable and this is
        // a read-only view.
        Ok(cell
            .map(|cell| cell.data.lock().unwrap().reviews.clone())
            .unwrap_or_default())
    }

    async fn persist_decision(&mut self, decision: &DecisionAggregation) -> Result<(), StoreError> {
        let mut data = self.cell.data.lock().unwrap();
        data.decision = Some(decision.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{Evaluator, Priority};
    use std::time::Duration;

    fn queued_run() -> Run {
        Run::queued(RunId::generate(), Priority::Normal)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        let fetched = store.get_run(&run.id).await.unwrap();
        assert_eq!(fetched.id, run.id);
        assert_eq!(fetched.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_create_twice_rejected() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();
        let result = store.create_run(run).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_run() {
        let store = MemoryRunStore::new();
        let result = store.get_run(&RunId::generate()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lease_mutations_visible_after_release() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        {
            let mut lease = store.lock_run(&run.id).await.unwrap();
            lease.update_status(RunStatus::Running).await.unwrap();
            lease.save_proposal("A full proposal").await.unwrap();
            lease
                .upsert_step(StepName::Expand, StepStatus::Completed, None)
                .await
                .unwrap();
        }

        let fetched = store.get_run(&run.id).await.unwrap();
        assert_eq!(fetched.status, RunStatus::Running);
        assert_eq!(fetched.proposal.as_deref(), Some("A full proposal"));

        let lease = store.lock_run(&run.id).await.unwrap();
        let completed = lease.completed_steps().await.unwrap();
        assert!(completed.contains(&StepName::Expand));
    }

    #[tokio::test]
    async fn test_lease_is_exclusive() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        let lease = store.lock_run(&run.id).await.unwrap();

        // A second lock attempt must block while the first lease is held.
        let blocked = tokio::time::timeout(Duration::from_millis(50), store.lock_run(&run.id));
        assert!(blocked.await.is_err());

        drop(lease);
        let lease = tokio::time::timeout(Duration::from_millis(50), store.lock_run(&run.id))
            .await
            .expect("lock should be free after release")
            .unwrap();
        assert_eq!(lease.run().id, run.id);
    }

    #[tokio::test]
    async fn test_second_locker_sees_first_writes() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        {
            let mut lease = store.lock_run(&run.id).await.unwrap();
            lease.update_status(RunStatus::Running).await.unwrap();
            lease.update_status(RunStatus::Completed).await.unwrap();
        }

        let lease = store.lock_run(&run.id).await.unwrap();
        assert!(lease.run().is_terminal());
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        let mut lease = store.lock_run(&run.id).await.unwrap();
        let result = lease.update_status(RunStatus::Completed).await;
        assert!(matches!(result, Err(StoreError::IllegalTransition { .. })));
        // The record is untouched.
        assert_eq!(lease.run().status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_duplicate_review_rejected() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        let mut lease = store.lock_run(&run.id).await.unwrap();
        let review = EvaluatorReview::new(Evaluator::Security, 0.8);
        lease.persist_review(&review).await.unwrap();

        let result = lease.persist_review(&review).await;
        assert!(matches!(result, Err(StoreError::DuplicateReview { .. })));
        assert_eq!(lease.reviews().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_parent_reviews_readable_without_parent_lock() {
        let store = MemoryRunStore::new();
        let parent = store.create_run(queued_run()).await.unwrap();
        {
            let mut lease = store.lock_run(&parent.id).await.unwrap();
            lease
                .persist_review(&EvaluatorReview::new(Evaluator::Quality, 0.9))
                .await
                .unwrap();
        }

        let child = store
            .create_run(Run::queued_revision(
                RunId::generate(),
                parent.id.clone(),
                Priority::Normal,
            ))
            .await
            .unwrap();

        let lease = store.lock_run(&child.id).await.unwrap();
        let reviews = lease.parent_reviews().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].evaluator_id, "quality");
    }

    #[tokio::test]
    async fn test_parent_reviews_empty_for_initial_run() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();
        let lease = store.lock_run(&run.id).await.unwrap();
        assert!(lease.parent_reviews().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attempt_counter_accumulates() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        {
            let mut lease = store.lock_run(&run.id).await.unwrap();
            assert_eq!(lease.record_attempt().await.unwrap(), 1);
        }
        let mut lease = store.lock_run(&run.id).await.unwrap();
        assert_eq!(lease.record_attempt().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_steps_accessor_sorted_by_order() {
        let store = MemoryRunStore::new();
        let run = store.create_run(queued_run()).await.unwrap();

        {
            let mut lease = store.lock_run(&run.id).await.unwrap();
            lease
                .upsert_step(StepName::AggregateDecision, StepStatus::Pending, None)
                .await
                .unwrap();
            lease
                .upsert_step(StepName::Expand, StepStatus::Completed, None)
                .await
                .unwrap();
        }

        let steps = store.steps(&run.id);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step, StepName::Expand);
        assert_eq!(steps[1].step, StepName::AggregateDecision);
    }
}
