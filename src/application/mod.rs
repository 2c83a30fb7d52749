pub mod cross_validation;
pub mod engine;
pub mod evaluator;
pub mod orchestrator;
pub mod reporting;
pub mod sensitivity;
pub mod strategies;
