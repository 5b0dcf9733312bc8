//! Application layer for conclave
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::PipelineBudgets;
pub use ports::{
    evaluation_service::{EvaluationError, EvaluationService},
    job_queue::{JobDelivery, JobMessage, JobPayload, JobQueue, MessageError, QueueError},
    metrics::{MetricsSink, NoMetrics},
    run_store::{RunLease, RunStore, StoreError},
};
pub use use_cases::evaluate_panel::{EvaluatePanelUseCase, PanelError, PanelTask};
pub use use_cases::process_job::{JobOutcome, ProcessJobError, ProcessJobUseCase};
