//! Backtesting engine: the per-bar loop and its supporting types.

pub mod loop_runner;
pub mod state;
pub mod warmup;

pub use loop_runner::run_backtest;
pub use state::{backfill, EngineError, RunResult};
pub use warmup::compute_warmup;
