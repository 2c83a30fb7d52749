//! Objective evaluator adapter.
//!
//! Wraps the external backtest collaborator into a total function: errors,
//! panics-as-errors and timeouts all become recorded evaluation failures so
//! the orchestrator is never aborted by a single bad candidate.

use crate::domain::metrics::EvaluationOutcome;
use crate::domain::parameters::ParameterAssignment;
use crate::domain::ports::{BacktestService, ObjectiveEvaluator};
use crate::domain::types::EvaluationContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default per-evaluation timeout. Generous: a single stuck backtest must
/// not block the whole run.
pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter from [`BacktestService`] to the [`ObjectiveEvaluator`] contract.
pub struct EvaluatorAdapter {
    backtest: Arc<dyn BacktestService>,
    timeout: Duration,
}

impl EvaluatorAdapter {
    pub fn new(backtest: Arc<dyn BacktestService>) -> Self {
        Self {
            backtest,
            timeout: DEFAULT_EVALUATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ObjectiveEvaluator for EvaluatorAdapter {
    async fn evaluate(
        &self,
        assignment: &ParameterAssignment,
        context: &EvaluationContext,
    ) -> EvaluationOutcome {
        match tokio::time::timeout(self.timeout, self.backtest.evaluate(assignment, context)).await
        {
            Ok(Ok(metrics)) => EvaluationOutcome::success(metrics),
            Ok(Err(e)) => {
                warn!("Evaluation failed for {}: {:#}", assignment, e);
                EvaluationOutcome::failure(format!("backtest error: {:#}", e))
            }
            Err(_) => {
                warn!(
                    "Evaluation timed out after {:?} for {}",
                    self.timeout, assignment
                );
                EvaluationOutcome::failure(format!(
                    "backtest timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }

    fn metric_names(&self) -> Vec<String> {
        self.backtest.metric_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{Metrics, SHARPE_RATIO};
    use anyhow::{Result, anyhow};

    struct FlakyBacktest {
        mode: &'static str,
    }

    #[async_trait]
    impl BacktestService for FlakyBacktest {
        async fn evaluate(
            &self,
            _assignment: &ParameterAssignment,
            _context: &EvaluationContext,
        ) -> Result<Metrics> {
            match self.mode {
                "ok" => Ok(Metrics::new().with(SHARPE_RATIO, 1.0)),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Metrics::new())
                }
                _ => Err(anyhow!("market data gap in requested window")),
            }
        }

        fn metric_names(&self) -> Vec<String> {
            vec![SHARPE_RATIO.to_string()]
        }
    }

    fn context() -> EvaluationContext {
        use crate::domain::types::TimeWindow;
        use chrono::{Duration as ChronoDuration, TimeZone, Utc};
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        EvaluationContext::new(
            TimeWindow::new(start, start + ChronoDuration::days(90)),
            vec!["TSLA".to_string()],
            100_000.0,
        )
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let adapter = EvaluatorAdapter::new(Arc::new(FlakyBacktest { mode: "ok" }));
        let outcome = adapter.evaluate(&ParameterAssignment::new(), &context()).await;
        assert_eq!(outcome.objective(SHARPE_RATIO), Some(1.0));
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let adapter = EvaluatorAdapter::new(Arc::new(FlakyBacktest { mode: "err" }));
        let outcome = adapter.evaluate(&ParameterAssignment::new(), &context()).await;
        match outcome {
            EvaluationOutcome::Failure { reason } => {
                assert!(reason.contains("market data gap"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failure() {
        let adapter = EvaluatorAdapter::new(Arc::new(FlakyBacktest { mode: "slow" }))
            .with_timeout(Duration::from_millis(50));
        let outcome = adapter.evaluate(&ParameterAssignment::new(), &context()).await;
        match outcome {
            EvaluationOutcome::Failure { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
