use thiserror::Error;

/// Errors surfaced by the optimization core.
///
/// Per-candidate evaluation failures are deliberately absent: those are
/// recorded as data on the candidate list and never raised.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("invalid parameter definition '{parameter}': {reason}")]
    InvalidDefinition { parameter: String, reason: String },

    #[error("assignment out of domain for '{parameter}': {reason}")]
    OutOfDomain { parameter: String, reason: String },

    #[error("unknown objective metric '{metric}' (evaluator produces: {available:?})")]
    UnknownMetric {
        metric: String,
        available: Vec<String>,
    },

    #[error("invalid optimization config: {reason}")]
    InvalidConfig { reason: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("all {attempted} evaluations failed; no best candidate exists")]
    TotalFailure { attempted: usize },
}
