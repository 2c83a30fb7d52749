//! Trading-strategy parameter optimization and robustness analysis.
//!
//! The domain layer defines parameter spaces, metrics and result types; the
//! application layer holds the search strategies, the orchestration loop and
//! the robustness passes; infrastructure supplies a synthetic backtest
//! collaborator for demos and tests. Real backtest engines plug in through
//! [`domain::ports::BacktestService`].

pub mod application;
pub mod domain;
pub mod infrastructure;
