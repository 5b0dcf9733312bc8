//! Port definitions
//!
//! Interfaces the application layer depends on; adapters live in the
//! infrastructure layer.

pub mod evaluation_service;
pub mod job_queue;
pub mod metrics;
pub mod run_store;
