//! TradeSim Core: event-driven single-instrument backtesting engine.
//!
//! This crate contains:
//! - Domain types (bars, price series, orders, trades, positions)
//! - The broker and its per-bar order matching
//! - The strategy capability interface and typed parameters
//! - Precomputed indicators with progressive reveal
//! - The bar-by-bar engine loop
//! - Content fingerprints for datasets and runs

pub mod broker;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod strategy;

pub use broker::{Broker, BrokerConfig, BrokerStatus, CommissionModel, ConfigError};
pub use domain::{
    Bar, DataError, Order, OrderError, OrderId, OrderRequest, Position, PriceSeries, SeriesView,
    Trade, TradeId,
};
pub use engine::{run_backtest, EngineError, RunResult};
pub use strategy::{Context, InitContext, ParamError, ParamSet, Strategy, StrategyError};
