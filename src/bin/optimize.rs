//! Strategy Parameter Optimizer Binary
//!
//! A CLI tool for running parameter search and robustness analysis against
//! the synthetic backtest collaborator.

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use stratopt::application::engine::OptimizeEngine;
use stratopt::application::orchestrator::OptimizationConfig;
use stratopt::application::reporting::OptimizeReporter;
use stratopt::application::strategies::{Algorithm, ObjectiveSpec};
use stratopt::domain::metrics::SHARPE_RATIO;
use stratopt::domain::parameters::{ParameterDefinition, ParameterSpace};
use stratopt::domain::types::{EvaluationContext, TimeWindow};
use stratopt::infrastructure::synthetic::SyntheticBacktestService;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Strategy Parameter Optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a parameter search
    Run {
        /// Search algorithm (grid, random, bayesian, genetic, particle_swarm)
        #[arg(short, long, default_value = "grid")]
        algorithm: String,

        /// Objective metric key
        #[arg(short, long, default_value = SHARPE_RATIO)]
        metric: String,

        /// Minimize the objective instead of maximizing it
        #[arg(long)]
        minimize: bool,

        /// Maximum number of evaluations
        #[arg(short, long, default_value = "100")]
        budget: usize,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Comma-separated list of symbols
        #[arg(long, default_value = "TSLA,NVDA")]
        symbols: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long, default_value = "2020-01-01")]
        start: String,

        /// End date (YYYY-MM-DD)
        #[arg(long, default_value = "2023-12-31")]
        end: String,

        /// Initial capital
        #[arg(long, default_value = "100000")]
        capital: f64,

        /// TOML file with parameter space configuration
        #[arg(long)]
        space_config: Option<String>,

        /// Output JSON file for results
        #[arg(short, long, default_value = "optimization_results.json")]
        output: String,

        /// Number of top results to display
        #[arg(short, long, default_value = "10")]
        top_n: usize,
    },
    /// Cross-validate and sensitivity-check the best assignment of a fresh run
    Robustness {
        /// Search algorithm used to find the best assignment
        #[arg(short, long, default_value = "grid")]
        algorithm: String,

        /// Objective metric key
        #[arg(short, long, default_value = SHARPE_RATIO)]
        metric: String,

        /// Minimize the objective instead of maximizing it
        #[arg(long)]
        minimize: bool,

        /// Maximum number of evaluations for the search
        #[arg(short, long, default_value = "100")]
        budget: usize,

        /// Number of cross-validation folds
        #[arg(short, long, default_value = "4")]
        folds: usize,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Comma-separated list of symbols
        #[arg(long, default_value = "TSLA,NVDA")]
        symbols: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long, default_value = "2020-01-01")]
        start: String,

        /// End date (YYYY-MM-DD)
        #[arg(long, default_value = "2023-12-31")]
        end: String,

        /// Initial capital
        #[arg(long, default_value = "100000")]
        capital: f64,

        /// TOML file with parameter space configuration
        #[arg(long)]
        space_config: Option<String>,

        /// Output JSON file for the robustness report
        #[arg(short, long, default_value = "robustness_report.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    let reporter = OptimizeReporter::new("results");

    match cli.command {
        Commands::Run {
            algorithm,
            metric,
            minimize,
            budget,
            seed,
            symbols,
            start,
            end,
            capital,
            space_config,
            output,
            top_n,
        } => {
            let space = load_space(space_config.as_deref())?;
            let context = build_context(&symbols, &start, &end, capital)?;
            let engine = engine_for(&space, seed);

            reporter.print_space_info(&space);

            let algorithm: Algorithm = algorithm.parse()?;
            let mut config = OptimizationConfig::new(
                space,
                algorithm,
                &metric,
                !minimize,
                budget,
                context,
            );
            config.seed = seed;

            println!("🚀 Starting optimization...\n");
            let result = engine.run_optimization(&config).await?;

            reporter.print_results_table(&result, top_n);
            reporter.print_best_config(&result);
            reporter.export_json(&result, &output)?;
            println!("✅ Optimization complete!\n");
        }
        Commands::Robustness {
            algorithm,
            metric,
            minimize,
            budget,
            folds,
            seed,
            symbols,
            start,
            end,
            capital,
            space_config,
            output,
        } => {
            let space = load_space(space_config.as_deref())?;
            let context = build_context(&symbols, &start, &end, capital)?;
            let engine = engine_for(&space, seed);

            let algorithm: Algorithm = algorithm.parse()?;
            let mut config = OptimizationConfig::new(
                space.clone(),
                algorithm,
                &metric,
                !minimize,
                budget,
                context.clone(),
            );
            config.seed = seed;

            println!("🚀 Searching for the best assignment...\n");
            let result = engine.run_optimization(&config).await?;
            reporter.print_best_config(&result);

            info!("Running robustness analysis on {}", result.best_assignment);
            let cv = engine
                .run_cross_validation(&result.best_assignment, &context, folds)
                .await?;
            reporter.print_cross_validation(&cv, &metric);

            let sensitivity = engine
                .run_sensitivity_analysis(
                    &space,
                    &result.best_assignment,
                    &context,
                    ObjectiveSpec::new(&metric, !minimize),
                )
                .await?;
            reporter.print_sensitivity(&sensitivity);

            let report = serde_json::json!({
                "best_assignment": result.best_assignment,
                "best_metric_value": result.best_metric_value,
                "cross_validation": cv,
                "sensitivity": sensitivity,
            });
            reporter.export_json(&report, &output)?;
            println!("✅ Robustness analysis complete!\n");
        }
    }

    Ok(())
}

fn engine_for(space: &ParameterSpace, seed: Option<u64>) -> OptimizeEngine {
    let backtest = SyntheticBacktestService::new(space.clone(), seed.unwrap_or(42));
    OptimizeEngine::from_backtest(Arc::new(backtest))
}

fn build_context(
    symbols: &str,
    start: &str,
    end: &str,
    capital: f64,
) -> Result<EvaluationContext> {
    let symbol_list: Vec<String> = symbols.split(',').map(|s| s.trim().to_string()).collect();
    let (start_dt, end_dt) = parse_date_range(start, end)?;
    Ok(EvaluationContext::new(
        TimeWindow::new(start_dt, end_dt),
        symbol_list,
        capital,
    ))
}

/// Parses start and end date strings into DateTime<Utc>.
fn parse_date_range(
    start: &str,
    end: &str,
) -> Result<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
    let start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .context(format!("Invalid start date format: {}", start))?;
    let end_date = NaiveDate::parse_from_str(end, "%Y-%m-%d")
        .context(format!("Invalid end date format: {}", end))?;

    let start_dt = Utc
        .from_local_datetime(&start_date.and_hms_opt(0, 0, 0).context("Invalid start time")?)
        .single()
        .context("Failed to create start datetime")?;
    let end_dt = Utc
        .from_local_datetime(&end_date.and_hms_opt(0, 0, 0).context("Invalid end time")?)
        .single()
        .context("Failed to create end datetime")?;

    Ok((start_dt, end_dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robustness_accepts_minimize_flag() {
        let cli = Cli::try_parse_from([
            "optimize",
            "robustness",
            "--metric",
            "max_drawdown",
            "--minimize",
            "--folds",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Robustness { metric, minimize, folds, .. } => {
                assert_eq!(metric, "max_drawdown");
                assert!(minimize);
                assert_eq!(folds, 3);
            }
            _ => panic!("expected robustness subcommand"),
        }
    }

    #[test]
    fn test_run_defaults_to_maximizing() {
        let cli = Cli::try_parse_from(["optimize", "run"]).unwrap();
        match cli.command {
            Commands::Run { minimize, .. } => assert!(!minimize),
            _ => panic!("expected run subcommand"),
        }
    }
}

/// Loads a parameter space from a TOML file, or falls back to a small demo
/// space.
fn load_space(path: Option<&str>) -> Result<ParameterSpace> {
    let space = match path {
        Some(path) => {
            info!("Loading parameter space from: {}", path);
            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read space config file: {}", path))?;
            toml::from_str(&content)
                .context(format!("Failed to parse space config TOML: {}", path))?
        }
        None => {
            info!("Using default demo parameter space");
            ParameterSpace::new(vec![
                ParameterDefinition::integer("fast_sma", 5, 50, 5, 10),
                ParameterDefinition::integer("slow_sma", 20, 200, 20, 100),
                ParameterDefinition::float("rsi_threshold", 20.0, 40.0, 5.0, 30.0),
                ParameterDefinition::categorical(
                    "mode",
                    &["trend", "meanreversion", "hybrid"],
                    "trend",
                ),
            ])
        }
    };
    space.validate()?;
    Ok(space)
}
