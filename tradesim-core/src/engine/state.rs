//! Engine error and run result types.

use thiserror::Error;

use crate::broker::ConfigError;
use crate::domain::Trade;
use crate::indicators::IndicatorSet;
use crate::strategy::StrategyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid broker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("strategy init failed: {0}")]
    Init(#[source] StrategyError),

    #[error("strategy failed at bar {bar}: {source}")]
    Next {
        bar: usize,
        #[source]
        source: StrategyError,
    },
}

/// Raw output of one engine run, before statistics.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Equity at each bar; warm-up bars are back-filled.
    pub equity_curve: Vec<f64>,
    /// Signed net position size at each bar.
    pub position_sizes: Vec<f64>,
    /// Closed trades in closing order.
    pub trades: Vec<Trade>,
    /// Trades still open at the end (only when trades are not finalized).
    pub open_trades: Vec<Trade>,
    pub final_cash: f64,
    /// Index of the first bar `next()` was called on.
    pub warmup_bars: usize,
    pub bar_count: usize,
    /// Bar on which the account ran out of money, if it did.
    pub out_of_money: Option<usize>,
    /// Stop/limit fills whose SL/TP also lay within the fill bar.
    pub ambiguous_fills: usize,
    /// Indicators at full length, for post-hoc inspection.
    pub indicators: IndicatorSet,
}

impl RunResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(self.final_cash)
    }
}

/// Fill each `NaN` with the next recorded value; trailing `NaN`s get `fallback`.
pub fn backfill(mut values: Vec<f64>, fallback: f64) -> Vec<f64> {
    let mut next = fallback;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
    values
}
