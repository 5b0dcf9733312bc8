//! Run entity and lifecycle
//!
//! A [`Run`] is one end-to-end pipeline execution. Its status only ever
//! moves forward; terminal states absorb every later message for the same
//! run, which is what makes at-least-once delivery safe.

use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque run identifier (a UUID string on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Parse and validate a UUID-string id
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(value)
            .map(|_| Self(value.to_string()))
            .map_err(|_| DomainError::InvalidRunId(value.to_string()))
    }

    /// Generate a fresh id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run lifecycle status (persisted lowercase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Terminal statuses absorb all further processing
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether moving to `next` is a legal forward transition
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether this run evaluates a fresh proposal or a revision of a parent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Initial,
    Revision,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Initial => "initial",
            RunKind::Revision => "revision",
        }
    }
}

/// Queue scheduling priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// One end-to-end pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub kind: RunKind,
    /// Parent run being revised (Revision runs only)
    pub parent_id: Option<RunId>,
    pub priority: Priority,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Durable delivery-attempt counter
    pub retry_count: u32,
    /// Expanded proposal text, present once the expand step has committed
    pub proposal: Option<String>,
}

impl Run {
    /// Create a freshly queued initial run
    pub fn queued(id: RunId, priority: Priority) -> Self {
        Self {
            id,
            status: RunStatus::Queued,
            kind: RunKind::Initial,
            parent_id: None,
            priority,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            proposal: None,
        }
    }

    /// Create a freshly queued revision of `parent_id`
    pub fn queued_revision(id: RunId, parent_id: RunId, priority: Priority) -> Self {
        Self {
            kind: RunKind::Revision,
            parent_id: Some(parent_id),
            ..Self::queued(id, priority)
        }
    }

    /// Apply a status transition, stamping timestamps
    ///
    /// Illegal transitions are rejected; the worker decides separately
    /// whether to warn-and-force (it does so only for Queued -> Running
    /// recovery after a crash).
    pub fn transition(&mut self, next: RunStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.apply_status(next);
        Ok(())
    }

    /// Set the status without legality checks (worker recovery path)
    pub fn force_status(&mut self, next: RunStatus) {
        self.apply_status(next);
    }

    fn apply_status(&mut self, next: RunStatus) {
        match next {
            RunStatus::Running => self.started_at = Some(Utc::now()),
            RunStatus::Completed | RunStatus::Failed => self.completed_at = Some(Utc::now()),
            RunStatus::Queued => {}
        }
        self.status = next;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_parse() {
        assert!(RunId::parse("6f2e9f4e-9a3b-4d10-8c0e-0e2f9f2b1a55").is_ok());
        assert!(RunId::parse("not-a-uuid").is_err());
        assert!(RunId::parse("").is_err());
    }

    #[test]
    fn test_generated_id_parses() {
        let id = RunId::generate();
        assert!(RunId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_status_persisted_strings() {
        assert_eq!(RunStatus::Queued.as_str(), "queued");
        assert_eq!(RunStatus::Running.as_str(), "running");
        assert_eq!(RunStatus::Completed.as_str(), "completed");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
        assert_eq!(RunKind::Initial.as_str(), "initial");
        assert_eq!(RunKind::Revision.as_str(), "revision");
    }

    #[test]
    fn test_legal_transitions() {
        assert!(RunStatus::Queued.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!RunStatus::Queued.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Running));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Queued));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Queued));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_transition_stamps_timestamps() {
        let mut run = Run::queued(RunId::generate(), Priority::Normal);
        assert!(run.started_at.is_none());

        run.transition(RunStatus::Running).unwrap();
        assert!(run.started_at.is_some());
        assert!(run.completed_at.is_none());

        run.transition(RunStatus::Completed).unwrap();
        assert!(run.completed_at.is_some());
        assert!(run.is_terminal());
    }

    #[test]
    fn test_transition_rejects_backwards() {
        let mut run = Run::queued(RunId::generate(), Priority::Normal);
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Failed).unwrap();

        let result = run.transition(RunStatus::Running);
        assert!(matches!(result, Err(DomainError::IllegalTransition { .. })));
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[test]
    fn test_queued_revision_links_parent() {
        let parent = RunId::generate();
        let run = Run::queued_revision(RunId::generate(), parent.clone(), Priority::High);
        assert_eq!(run.kind, RunKind::Revision);
        assert_eq!(run.parent_id, Some(parent));
        assert_eq!(run.priority, Priority::High);
    }
}
