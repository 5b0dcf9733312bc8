//! Application-layer configuration

pub mod budgets;

pub use budgets::PipelineBudgets;
