//! Reporting utilities for optimization results.
//!
//! Provides formatted console output and JSON export capabilities.

use crate::domain::metrics::{MAX_DRAWDOWN, SHARPE_RATIO, TOTAL_RETURN, WIN_RATE};
use crate::domain::parameters::ParameterSpace;
use crate::domain::types::{CrossValidationFold, OptimizationResult, SensitivityResult};
use anyhow::{Context, Result};
use std::path::Path;

/// Reporter for optimization results output.
pub struct OptimizeReporter {
    output_dir: String,
}

impl OptimizeReporter {
    /// Creates a new reporter with the given output directory.
    pub fn new(output_dir: &str) -> Self {
        Self {
            output_dir: output_dir.to_string(),
        }
    }

    /// Prints the parameter space configuration.
    pub fn print_space_info(&self, space: &ParameterSpace) {
        println!("\n📊 Parameter Space:");
        for def in &space.parameters {
            println!(
                "  {:<20} {} values, default {}",
                def.name,
                def.value_count(),
                def.default_value()
            );
        }
        println!("\n🔢 Full grid size: {}", space.grid_size());
    }

    /// Prints a formatted table of the top ranked candidates.
    pub fn print_results_table(&self, result: &OptimizationResult, top_n: usize) {
        println!("\n{}", "=".repeat(96));
        println!(
            "✅ OPTIMIZATION COMPLETE - {} evaluations ({} failed) in {}ms{}",
            result.candidates.len(),
            result.failed_count(),
            result.duration_ms,
            if result.cancelled { " [cancelled]" } else { "" }
        );
        println!("{}", "=".repeat(96));

        println!(
            "{:<4} | {:>8} | {:>8} | {:>8} | {:>8} | {}",
            "#", "Sharpe", "Return%", "WinRate", "MaxDD%", "Parameters"
        );
        println!("{}", "-".repeat(96));

        for candidate in result.candidates.iter().take(top_n) {
            let Some(rank) = candidate.rank else { continue };
            let metrics = candidate.outcome.metrics();
            let get = |key: &str| {
                metrics
                    .and_then(|m| m.get(key))
                    .map(|v| format!("{:>8.2}", v))
                    .unwrap_or_else(|| format!("{:>8}", "-"))
            };
            println!(
                "{:<4} | {} | {} | {} | {} | {}",
                rank,
                get(SHARPE_RATIO),
                get(TOTAL_RETURN),
                get(WIN_RATE),
                get(MAX_DRAWDOWN),
                candidate.assignment
            );
        }

        println!("{}\n", "=".repeat(96));
    }

    /// Prints detailed information about the best candidate.
    pub fn print_best_config(&self, result: &OptimizationResult) {
        println!("🏆 BEST CONFIGURATION:");
        for (name, value) in result.best_assignment.iter() {
            println!("  {:<20} {}", name, value);
        }
        println!("\n  Objective value:     {:.4}", result.best_metric_value);
        if let Some(best) = result.candidates.first() {
            if let Some(metrics) = best.outcome.metrics() {
                for name in metrics.names() {
                    if let Some(value) = metrics.get(&name) {
                        println!("  {:<20} {:.4}", name, value);
                    }
                }
            }
        }
        println!("{}\n", "=".repeat(96));
    }

    /// Prints per-fold cross-validation outcomes for a metric.
    pub fn print_cross_validation(&self, folds: &[CrossValidationFold], metric: &str) {
        println!("\n🔁 CROSS-VALIDATION ({} folds):", folds.len());
        println!(
            "{:<6} | {:<12} | {:<12} | {:>10}",
            "Fold", "Start", "End", metric
        );
        println!("{}", "-".repeat(50));
        let mut values = Vec::new();
        for fold in folds {
            let objective = fold.outcome.objective(metric);
            let value = objective
                .map(|v| format!("{:>10.4}", v))
                .unwrap_or_else(|| format!("{:>10}", "FAILED"));
            if let Some(v) = objective {
                values.push(v);
            }
            println!(
                "{:<6} | {:<12} | {:<12} | {}",
                fold.fold_index,
                fold.window.start.format("%Y-%m-%d"),
                fold.window.end.format("%Y-%m-%d"),
                value
            );
        }
        if !values.is_empty() {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var =
                values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
            println!("{}", "-".repeat(50));
            println!("  Mean: {:.4}  Std: {:.4}", mean, var.sqrt());
        }
        println!();
    }

    /// Prints sensitivity scores as a horizontal bar chart.
    pub fn print_sensitivity(&self, results: &[SensitivityResult]) {
        println!("\n🎯 PARAMETER SENSITIVITY:");
        let mut sorted: Vec<&SensitivityResult> = results.iter().collect();
        sorted.sort_by(|a, b| {
            b.sensitivity_score
                .partial_cmp(&a.sensitivity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for result in sorted {
            let bar_len = (result.sensitivity_score * 30.0).round() as usize;
            let optimal = result
                .optimal_value
                .as_ref()
                .map(|v| format!("best={}", v))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {:<20} {:>6.3} |{:<30}| {}",
                result.parameter_name,
                result.sensitivity_score,
                "█".repeat(bar_len),
                optimal
            );
            println!("    {}", result.description);
        }
        println!();
    }

    /// Exports any serializable report to a JSON file.
    pub fn export_json<T: serde::Serialize>(&self, report: &T, filename: &str) -> Result<()> {
        let output_path = if filename.contains('/') || filename.contains('\\') {
            filename.to_string()
        } else {
            format!("{}/{}", self.output_dir, filename)
        };

        // Ensure directory exists
        if let Some(parent) = Path::new(&output_path).parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let json_output =
            serde_json::to_string_pretty(report).context("Failed to serialize results to JSON")?;

        std::fs::write(&output_path, json_output)
            .context(format!("Failed to write results to {}", output_path))?;

        println!("💾 Results saved to: {}", output_path);
        Ok(())
    }
}
