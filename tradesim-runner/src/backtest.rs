//! Backtest entry point: validation, one engine run, statistics.

use std::marker::PhantomData;

use thiserror::Error;
use tracing::{debug, warn};
use tradesim_core::fingerprint::{DatasetHash, RunId};
use tradesim_core::strategy::{apply_overrides, to_param_set};
use tradesim_core::{
    run_backtest, BrokerConfig, ConfigError, EngineError, ParamError, ParamSet, PriceSeries,
    Strategy,
};

use crate::result::BacktestResult;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid broker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid strategy parameters: {0}")]
    Params(#[from] ParamError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A validated backtest of strategy `S` over one price series.
///
/// Construction checks the broker configuration once; every run builds a
/// fresh strategy and broker, so a `Backtest` can be run repeatedly and
/// shared across optimization workers.
pub struct Backtest<'a, S: Strategy> {
    data: &'a PriceSeries,
    config: BrokerConfig,
    params: S::Params,
    dataset_hash: DatasetHash,
    _strategy: PhantomData<fn() -> S>,
}

impl<'a, S: Strategy> Backtest<'a, S> {
    pub fn new(data: &'a PriceSeries, config: BrokerConfig) -> Result<Self, RunError> {
        config.validate()?;

        let max_close = data.full().close().iter().copied().fold(f64::MIN, f64::max);
        if max_close > config.cash {
            warn!(
                max_close,
                cash = config.cash,
                "some prices are larger than initial cash; orders may be too small to fill"
            );
        }

        Ok(Self {
            data,
            config,
            params: S::Params::default(),
            dataset_hash: DatasetHash::of(data),
            _strategy: PhantomData,
        })
    }

    /// Replace the base parameters every run starts from.
    pub fn with_params(mut self, params: S::Params) -> Self {
        self.params = params;
        self
    }

    pub fn data(&self) -> &'a PriceSeries {
        self.data
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn params(&self) -> &S::Params {
        &self.params
    }

    pub fn dataset_hash(&self) -> &DatasetHash {
        &self.dataset_hash
    }

    /// Run with the base parameters.
    pub fn run(&self) -> Result<BacktestResult, RunError> {
        self.execute(self.params.clone())
    }

    /// Run with `overrides` applied on top of the base parameters.
    ///
    /// Unknown parameter names and wrongly typed values fail before any bar
    /// is processed.
    pub fn run_with(&self, overrides: &ParamSet) -> Result<BacktestResult, RunError> {
        let params = apply_overrides(&self.params, overrides)?;
        self.execute(params)
    }

    fn execute(&self, params: S::Params) -> Result<BacktestResult, RunError> {
        let param_set = to_param_set(&params)?;
        let mut strategy = S::from_params(params);
        let name = strategy.name().to_string();

        let run = run_backtest(self.data, &self.config, &mut strategy)?;
        let run_id = RunId::new(&name, &self.config, &param_set, &self.dataset_hash);
        let result = BacktestResult::from_run(
            &name,
            param_set,
            run_id.to_string(),
            self.dataset_hash.to_string(),
            self.data,
            &run,
        );

        debug!(
            strategy = %name,
            run_id = run_id.short(),
            trades = result.stats.trades,
            return_pct = result.stats.return_pct,
            "run complete"
        );
        Ok(result)
    }
}
