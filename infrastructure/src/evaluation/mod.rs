//! Evaluation service adapters

mod http;

pub use http::HttpEvaluationService;
