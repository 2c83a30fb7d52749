//! Cross-validation of a chosen assignment across time folds.
//!
//! The base evaluation window is partitioned into contiguous sub-windows and
//! the assignment is re-evaluated on each one, concurrently. A fold that
//! fails is recorded as a failure, not raised; robustness analysis needs to
//! see which slices of history broke.

use crate::domain::errors::OptimizeError;
use crate::domain::parameters::ParameterAssignment;
use crate::domain::ports::ObjectiveEvaluator;
use crate::domain::types::{CrossValidationFold, EvaluationContext};
use chrono::Duration;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tracing::info;

/// Shortest fold worth backtesting. Anything under a day cannot produce the
/// daily-resolution metrics the evaluators here report.
pub const MIN_FOLD: Duration = Duration::days(1);

pub struct CrossValidationRunner {
    evaluator: Arc<dyn ObjectiveEvaluator>,
    max_concurrency: usize,
}

impl CrossValidationRunner {
    pub fn new(evaluator: Arc<dyn ObjectiveEvaluator>) -> Self {
        Self {
            evaluator,
            max_concurrency: 4,
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Evaluates `assignment` independently over `fold_count` sub-windows of
    /// the context window. Folds come back in chronological order.
    pub async fn run(
        &self,
        assignment: &ParameterAssignment,
        context: &EvaluationContext,
        fold_count: usize,
    ) -> Result<Vec<CrossValidationFold>, OptimizeError> {
        let windows = context.window.split(fold_count)?;
        if let Some(shortest) = windows.iter().map(|w| w.duration()).min() {
            if shortest < MIN_FOLD {
                return Err(OptimizeError::InsufficientData {
                    reason: format!(
                        "window of {} days cannot supply {} folds of at least one day",
                        context.window.duration().num_days(),
                        fold_count
                    ),
                });
            }
        }

        info!(
            "Cross-validation: {} folds of ~{} days over {}",
            fold_count,
            windows[0].duration().num_days(),
            assignment
        );

        let folds: Vec<CrossValidationFold> = stream::iter(
            windows.into_iter().enumerate().map(|(fold_index, window)| {
                let evaluator = Arc::clone(&self.evaluator);
                let fold_context = context.with_window(window);
                let assignment = assignment.clone();
                async move {
                    let outcome = evaluator.evaluate(&assignment, &fold_context).await;
                    CrossValidationFold {
                        fold_index,
                        window,
                        outcome,
                    }
                }
            }),
        )
        .buffered(self.max_concurrency)
        .collect()
        .await;

        let failed = folds.iter().filter(|f| !f.outcome.is_success()).count();
        info!(
            "Cross-validation complete: {}/{} folds succeeded",
            folds.len() - failed,
            folds.len()
        );
        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{EvaluationOutcome, Metrics, SHARPE_RATIO};
    use crate::domain::types::TimeWindow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    /// Succeeds on every window except ones starting in `bad_year`.
    struct WindowedEvaluator {
        bad_year: i32,
    }

    #[async_trait]
    impl ObjectiveEvaluator for WindowedEvaluator {
        async fn evaluate(
            &self,
            _assignment: &ParameterAssignment,
            context: &EvaluationContext,
        ) -> EvaluationOutcome {
            use chrono::Datelike;
            if context.window.start.year() == self.bad_year {
                return EvaluationOutcome::failure("no data for this year");
            }
            let days = context.window.duration().num_days() as f64;
            EvaluationOutcome::success(Metrics::new().with(SHARPE_RATIO, 1.0 + days / 1000.0))
        }

        fn metric_names(&self) -> Vec<String> {
            vec![SHARPE_RATIO.to_string()]
        }
    }

    fn context(days: i64) -> EvaluationContext {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        EvaluationContext::new(
            TimeWindow::new(start, start + Duration::days(days)),
            vec!["SPY".to_string()],
            50_000.0,
        )
    }

    #[tokio::test]
    async fn test_folds_cover_window_in_order() {
        let runner = CrossValidationRunner::new(Arc::new(WindowedEvaluator { bad_year: 0 }));
        let ctx = context(400);
        let folds = runner
            .run(&ParameterAssignment::new(), &ctx, 4)
            .await
            .unwrap();

        assert_eq!(folds.len(), 4);
        for (i, fold) in folds.iter().enumerate() {
            assert_eq!(fold.fold_index, i);
            assert_eq!(fold.window.duration(), Duration::days(100));
            assert!(fold.outcome.is_success());
        }
        assert_eq!(folds[0].window.start, ctx.window.start);
        assert_eq!(folds[3].window.end, ctx.window.end);
    }

    #[tokio::test]
    async fn test_failed_fold_is_recorded_not_fatal() {
        // 732 days from 2020-01-01 split in two: fold 0 starts 2020-01-01,
        // fold 1 starts 2021-01-01 (2020 is a leap year, so each fold is 366
        // days). Only the 2020 fold fails.
        let runner = CrossValidationRunner::new(Arc::new(WindowedEvaluator { bad_year: 2020 }));
        let folds = runner
            .run(&ParameterAssignment::new(), &context(732), 2)
            .await
            .unwrap();

        assert_eq!(folds.len(), 2);
        use chrono::Datelike;
        assert_eq!(folds[1].window.start.year(), 2021);
        assert!(!folds[0].outcome.is_success());
        assert!(folds[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_too_short_window_is_insufficient_data() {
        let runner = CrossValidationRunner::new(Arc::new(WindowedEvaluator { bad_year: 0 }));
        let err = runner
            .run(&ParameterAssignment::new(), &context(3), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizeError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn test_single_fold_rejected() {
        let runner = CrossValidationRunner::new(Arc::new(WindowedEvaluator { bad_year: 0 }));
        let err = runner
            .run(&ParameterAssignment::new(), &context(100), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizeError::InsufficientData { .. }));
    }
}
