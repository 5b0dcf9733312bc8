//! Job queue port
//!
//! The broker boundary: messages arrive at least once, get acknowledged on
//! success (or when dropped as poison), and negatively acknowledged on
//! failure so the broker's own redelivery policy can take over.

use async_trait::async_trait;
use conclave_domain::{DomainError, Priority, RunId, RunKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the queue itself (not by job processing)
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,

    #[error("Queue backend error: {0}")]
    Backend(String),
}

/// Reasons a message is rejected at parse time
///
/// A malformed message is poison: it is acknowledged and dropped, never
/// retried.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidRunId(DomainError),

    #[error("Message payload has an empty idea")]
    EmptyIdea,
}

/// Payload carried by a job message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    /// The short idea to expand and evaluate
    pub idea: String,
    /// Whether a revision was flagged as addressing a security concern
    #[serde(default)]
    pub security_concern: bool,
}

/// A parsed and validated job message
///
/// Wire format:
///
/// ```json
/// {
///   "run_id": "6f2e9f4e-9a3b-4d10-8c0e-0e2f9f2b1a55",
///   "run_kind": "initial",
///   "priority": "normal",
///   "payload": {"idea": "Cache the session index"}
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub run_id: RunId,
    pub run_kind: RunKind,
    #[serde(default)]
    pub priority: Priority,
    pub payload: JobPayload,
}

impl JobMessage {
    /// Parse a raw message body, validating the run id and payload
    pub fn parse(body: &[u8]) -> Result<Self, MessageError> {
        let message: JobMessage = serde_json::from_slice(body)?;
        // RunId deserializes transparently; re-validate the UUID shape here
        // since serde does not.
        RunId::parse(message.run_id.as_str()).map_err(MessageError::InvalidRunId)?;
        if message.payload.idea.trim().is_empty() {
            return Err(MessageError::EmptyIdea);
        }
        Ok(message)
    }

    /// Serialize for publishing
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// One in-flight delivery of a job message
#[async_trait]
pub trait JobDelivery: Send {
    /// Raw message body
    fn body(&self) -> &[u8];

    /// Acknowledge: processing finished (successfully or as a handled
    /// no-op / poison drop); the broker must not redeliver
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    /// Negative-acknowledge: processing failed; the broker's redelivery
    /// and backoff policy decides what happens next
    async fn nack(self: Box<Self>) -> Result<(), QueueError>;
}

/// Broker connection used by the worker loop and by producers
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Publish a job message
    async fn publish(&self, message: &JobMessage) -> Result<(), QueueError>;

    /// Receive the next delivery, waiting if none is ready
    ///
    /// Returns `Ok(None)` once the queue is closed and drained.
    async fn receive(&self) -> Result<Option<Box<dyn JobDelivery>>, QueueError>;
}
