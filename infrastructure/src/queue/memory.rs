//! In-memory job queue adapter
//!
//! A broker stand-in for tests and single-process deployments. It keeps
//! the real broker's contract: at-least-once delivery, high-priority
//! messages dispatched first, nack putting the message back at the front
//! of its queue.

use async_trait::async_trait;
use conclave_application::{JobDelivery, JobMessage, JobQueue, QueueError};
use conclave_domain::Priority;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Default)]
struct QueueState {
    high: VecDeque<Vec<u8>>,
    normal: VecDeque<Vec<u8>>,
    closed: bool,
}

impl QueueState {
    fn pop(&mut self) -> Option<(Vec<u8>, Priority)> {
        if let Some(body) = self.high.pop_front() {
            return Some((body, Priority::High));
        }
        self.normal.pop_front().map(|body| (body, Priority::Normal))
    }

    fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty()
    }
}

/// In-process job queue with priority dispatch
#[derive(Clone, Default)]
pub struct MemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the queue; consumers drain what is buffered and then get
    /// `Ok(None)`
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }
}

struct MemoryDelivery {
    body: Vec<u8>,
    priority: Priority,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl JobDelivery for MemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<(), QueueError> {
        debug!("Nack: requeueing message for redelivery");
        {
            let mut state = self.state.lock().unwrap();
            match self.priority {
                Priority::High => state.high.push_front(self.body),
                Priority::Normal => state.normal.push_front(self.body),
            }
        }
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn publish(&self, message: &JobMessage) -> Result<(), QueueError> {
        let body = message.to_bytes();
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(QueueError::Closed);
            }
            match message.priority {
                Priority::High => state.high.push_back(body),
                Priority::Normal => state.normal.push_back(body),
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Box<dyn JobDelivery>>, QueueError> {
        loop {
            // Register for a wakeup before checking, so a publish between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().unwrap();
                if let Some((body, priority)) = state.pop() {
                    return Ok(Some(Box::new(MemoryDelivery {
                        body,
                        priority,
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                    })));
                }
                if state.closed && state.is_empty() {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{RunId, RunKind};

    fn message(priority: Priority, idea: &str) -> JobMessage {
        JobMessage {
            run_id: RunId::generate(),
            run_kind: RunKind::Initial,
            priority,
            payload: conclave_application::JobPayload {
                idea: idea.to_string(),
                security_concern: false,
            },
        }
    }

    async fn receive_idea(queue: &MemoryJobQueue) -> (String, Box<dyn JobDelivery>) {
        let delivery = queue.receive().await.unwrap().unwrap();
        let parsed = JobMessage::parse(delivery.body()).unwrap();
        (parsed.payload.idea, delivery)
    }

    #[tokio::test]
    async fn test_fifo_within_priority() {
        let queue = MemoryJobQueue::new();
        queue.publish(&message(Priority::Normal, "first")).await.unwrap();
        queue.publish(&message(Priority::Normal, "second")).await.unwrap();

        let (idea, delivery) = receive_idea(&queue).await;
        assert_eq!(idea, "first");
        delivery.ack().await.unwrap();

        let (idea, delivery) = receive_idea(&queue).await;
        assert_eq!(idea, "second");
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_high_priority_dispatched_first() {
        let queue = MemoryJobQueue::new();
        queue.publish(&message(Priority::Normal, "routine")).await.unwrap();
        queue.publish(&message(Priority::High, "urgent")).await.unwrap();

        let (idea, delivery) = receive_idea(&queue).await;
        assert_eq!(idea, "urgent");
        delivery.ack().await.unwrap();

        let (idea, delivery) = receive_idea(&queue).await;
        assert_eq!(idea, "routine");
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_nack_redelivers() {
        let queue = MemoryJobQueue::new();
        queue.publish(&message(Priority::Normal, "retry me")).await.unwrap();

        let (_, delivery) = receive_idea(&queue).await;
        delivery.nack().await.unwrap();

        let (idea, delivery) = receive_idea(&queue).await;
        assert_eq!(idea, "retry me");
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = MemoryJobQueue::new();
        queue.publish(&message(Priority::Normal, "buffered")).await.unwrap();
        queue.close();

        // Buffered message still comes out, then the queue reports end.
        let (idea, delivery) = receive_idea(&queue).await;
        assert_eq!(idea, "buffered");
        delivery.ack().await.unwrap();
        assert!(queue.receive().await.unwrap().is_none());

        // Publishing after close is rejected.
        let result = queue.publish(&message(Priority::Normal, "late")).await;
        assert!(matches!(result, Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let queue = MemoryJobQueue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive().await })
        };

        // Give the consumer a chance to park before publishing.
        tokio::task::yield_now().await;
        queue.publish(&message(Priority::Normal, "late arrival")).await.unwrap();

        let delivery = consumer.await.unwrap().unwrap().unwrap();
        let parsed = JobMessage::parse(delivery.body()).unwrap();
        assert_eq!(parsed.payload.idea, "late arrival");
    }
}
