// Parameter space model
pub mod parameters;

// Metrics map and evaluation outcomes
pub mod metrics;

// Result types: candidates, convergence, folds, sensitivity
pub mod types;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
