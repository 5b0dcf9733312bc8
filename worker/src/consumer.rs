//! Bounded consumer loop over the job queue
//!
//! Pulls deliveries, hands each to the process-job use case on its own
//! task, and translates the outcome into ack or nack. Concurrency is
//! bounded by a semaphore; shutdown cancels the intake loop and then
//! waits a bounded time for in-flight jobs to finish.

use conclave_application::{
    EvaluationService, JobDelivery, JobQueue, ProcessJobUseCase, QueueError, RunStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Queue consumer with bounded concurrency and graceful drain
pub struct WorkerPool<S: EvaluationService + 'static, R: RunStore + 'static> {
    queue: Arc<dyn JobQueue>,
    use_case: Arc<ProcessJobUseCase<S, R>>,
    concurrency: usize,
    drain_timeout: Duration,
}

impl<S: EvaluationService + 'static, R: RunStore + 'static> WorkerPool<S, R> {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        use_case: Arc<ProcessJobUseCase<S, R>>,
        concurrency: usize,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            use_case,
            concurrency: concurrency.max(1),
            drain_timeout,
        }
    }

    /// Consume until the queue closes or shutdown is requested, then
    /// drain in-flight jobs within the drain timeout
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), QueueError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut inflight: JoinSet<()> = JoinSet::new();
        info!("Worker loop started (concurrency {})", self.concurrency);

        loop {
            // Reap finished tasks so the set does not grow unbounded.
            while inflight.try_join_next().is_some() {}

            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.queue.receive() => match received? {
                    Some(delivery) => delivery,
                    // Queue closed and drained.
                    None => break,
                },
            };

            let use_case = Arc::clone(&self.use_case);
            inflight.spawn(async move {
                let _permit = permit;
                handle_delivery(use_case, delivery).await;
            });
        }

        if !inflight.is_empty() {
            info!("Draining {} in-flight job(s)", inflight.len());
        }
        let drain = async {
            while inflight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            warn!(
                "Drain timeout ({:?}) elapsed; abandoning in-flight jobs",
                self.drain_timeout
            );
        }
        info!("Worker loop stopped");
        Ok(())
    }
}

/// Process one delivery and acknowledge it accordingly
///
/// Every `Ok` outcome acks (including terminal no-ops and dropped
/// poison); an error nacks so the broker's redelivery policy takes over.
async fn handle_delivery<S: EvaluationService + 'static, R: RunStore>(
    use_case: Arc<ProcessJobUseCase<S, R>>,
    delivery: Box<dyn JobDelivery>,
) {
    match use_case.process(delivery.body()).await {
        Ok(outcome) => {
            debug!("Delivery handled: {:?}", outcome);
            if let Err(e) = delivery.ack().await {
                warn!("Ack failed: {}", e);
            }
        }
        Err(e) => {
            error!("Job failed: {}", e);
            if let Err(e) = delivery.nack().await {
                warn!("Nack failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conclave_application::{EvaluationError, JobMessage, JobPayload};
    use conclave_domain::{Evaluator, EvaluatorReview, Priority, RunId, RunKind, RunStatus};
    use conclave_infrastructure::{MemoryJobQueue, MemoryRunStore};

    struct StubService;

    #[async_trait]
    impl EvaluationService for StubService {
        async fn expand(&self, idea: &str) -> Result<String, EvaluationError> {
            Ok(format!("Proposal for: {}", idea))
        }

        async fn submit(
            &self,
            _proposal: &str,
            evaluator: Evaluator,
        ) -> Result<EvaluatorReview, EvaluationError> {
            Ok(EvaluatorReview::new(evaluator, 0.9))
        }
    }

    fn pool(
        queue: &MemoryJobQueue,
        store: &MemoryRunStore,
        concurrency: usize,
    ) -> WorkerPool<StubService, MemoryRunStore> {
        let use_case = Arc::new(ProcessJobUseCase::new(
            Arc::new(StubService),
            Arc::new(store.clone()),
        ));
        WorkerPool::new(
            Arc::new(queue.clone()),
            use_case,
            concurrency,
            Duration::from_secs(5),
        )
    }

    fn message(idea: &str) -> JobMessage {
        JobMessage {
            run_id: RunId::generate(),
            run_kind: RunKind::Initial,
            priority: Priority::Normal,
            payload: JobPayload {
                idea: idea.to_string(),
                security_concern: false,
            },
        }
    }

    #[tokio::test]
    async fn test_pool_processes_queue_until_closed() {
        let queue = MemoryJobQueue::new();
        let store = MemoryRunStore::new();

        let first = message("Cache the index");
        let second = message("Shard the store");
        queue.publish(&first).await.unwrap();
        queue.publish(&second).await.unwrap();
        queue.close();

        pool(&queue, &store, 2)
            .run(CancellationToken::new())
            .await
            .unwrap();

        // Both runs were created via the audit path and completed.
        for id in [&first.run_id, &second.run_id] {
            let run = store.get_run(id).await.unwrap();
            assert_eq!(run.status, RunStatus::Completed);
            assert!(store.decision(id).is_some());
        }
    }

    #[tokio::test]
    async fn test_pool_stops_on_shutdown() {
        let queue = MemoryJobQueue::new();
        let store = MemoryRunStore::new();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(pool(&queue, &store, 1).run(shutdown.clone()));
        tokio::task::yield_now().await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("pool should stop after shutdown")
            .unwrap()
            .unwrap();
    }
}
