//! TradeSim Runner: backtest orchestration, statistics and optimization.
//!
//! This crate builds on `tradesim-core` to provide:
//! - The `Backtest` entry point: validation, one run, statistics
//! - Performance statistics over the equity curve and closed trades
//! - Grid and randomized parameter optimization, run in parallel
//! - TOML run configuration and CSV bar loading
//! - CSV/JSON export of results

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod metrics;
pub mod optimize;
pub mod result;

pub use backtest::{Backtest, RunError};
pub use config::{ConfigError, OptimizeSection, RunConfig, StrategySection};
pub use data_loader::{load_csv, parse_csv, LoadError};
pub use export::{save_artifacts, save_heatmap, ExportError};
pub use fitness::{FitnessMetric, Objective};
pub use metrics::Stats;
pub use optimize::{
    Heatmap, HeatmapRow, MaxTries, OptimizeError, OptimizeSpec, Optimization, ParamGrid,
};
pub use result::{BacktestResult, EquityPoint, TradeRow, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;
    use tradesim_core::strategy::examples::SmaCross;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn stats_and_results_are_send_sync() {
        assert_send::<Stats>();
        assert_sync::<Stats>();
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn sweep_inputs_are_shareable() {
        assert_sync::<Backtest<'static, SmaCross>>();
        assert_send::<OptimizeSpec>();
        assert_sync::<OptimizeSpec>();
        assert_send::<Objective>();
        assert_sync::<Objective>();
    }

    #[test]
    fn errors_cross_threads() {
        assert_send::<RunError>();
        assert_send::<OptimizeError>();
        assert_send::<ExportError>();
        assert_send::<LoadError>();
    }
}
