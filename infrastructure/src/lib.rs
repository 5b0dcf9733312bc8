//! Infrastructure layer for conclave
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod evaluation;
pub mod queue;
pub mod store;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileEvaluationConfig, FilePanelConfig,
    FileWorkerConfig,
};
pub use evaluation::HttpEvaluationService;
pub use queue::MemoryJobQueue;
pub use store::MemoryRunStore;
