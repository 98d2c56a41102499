//! Backtest result records: stats, trades table and equity curve.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tradesim_core::strategy::ParamSet;
use tradesim_core::{PriceSeries, RunResult, Trade};

use crate::metrics::{drawdown_series, Stats};

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub params: ParamSet,
    pub run_id: String,
    pub dataset_hash: String,
    pub stats: Stats,
    /// Closed trades in closing order.
    pub trades: Vec<TradeRow>,
    /// Trades left open because trades were not finalized.
    #[serde(default)]
    pub open_trades: Vec<TradeRow>,
    pub equity_curve: Vec<EquityPoint>,
    pub warmup_bars: usize,
    /// Bar on which the account ran out of money, if it did.
    pub out_of_money: Option<usize>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// One row of the trades table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    /// Signed unit count: positive long, negative short.
    pub size: f64,
    pub entry_bar: usize,
    pub exit_bar: Option<usize>,
    pub entry_time: Option<NaiveDateTime>,
    pub exit_time: Option<NaiveDateTime>,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    /// Net of commission; open trades are valued at the last close.
    pub pnl: f64,
    pub return_pct: f64,
    pub commission: f64,
    pub duration_bars: usize,
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl TradeRow {
    pub fn from_trade(trade: &Trade, data: &PriceSeries) -> Self {
        let view = data.full();
        let timestamps = view.timestamps();
        let last_bar = view.len().saturating_sub(1);
        let mark = view.last_close().unwrap_or(trade.entry_price());
        let exit_bar = trade.exit_bar();

        Self {
            size: trade.size(),
            entry_bar: trade.entry_bar(),
            exit_bar,
            entry_time: timestamps.get(trade.entry_bar()).copied(),
            exit_time: exit_bar.and_then(|i| timestamps.get(i).copied()),
            entry_price: trade.entry_price(),
            exit_price: trade.exit_price(),
            pnl: trade.pl(mark),
            return_pct: trade.pl_pct(mark) * 100.0,
            commission: trade.commission(),
            duration_bars: exit_bar.unwrap_or(last_bar).saturating_sub(trade.entry_bar()),
            sl: trade.sl(),
            tp: trade.tp(),
            tag: trade.tag().map(str::to_owned),
        }
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }
}

/// One bar of the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar: usize,
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    /// Drawdown from the running peak, as a positive percentage.
    pub drawdown_pct: f64,
}

/// Equity and drawdown per bar.
pub fn equity_points(data: &PriceSeries, equity: &[f64]) -> Vec<EquityPoint> {
    let dd = drawdown_series(equity);
    data.full()
        .timestamps()
        .iter()
        .zip(equity.iter().zip(dd))
        .enumerate()
        .map(|(bar, (&timestamp, (&equity, dd)))| EquityPoint {
            bar,
            timestamp,
            equity,
            drawdown_pct: dd * 100.0,
        })
        .collect()
}

impl BacktestResult {
    /// Assemble the result record of a finished run.
    pub fn from_run(
        strategy: &str,
        params: ParamSet,
        run_id: String,
        dataset_hash: String,
        data: &PriceSeries,
        run: &RunResult,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            strategy: strategy.to_string(),
            params,
            run_id,
            dataset_hash,
            stats: Stats::compute(data, run),
            trades: run.trades.iter().map(|t| TradeRow::from_trade(t, data)).collect(),
            open_trades: run
                .open_trades
                .iter()
                .map(|t| TradeRow::from_trade(t, data))
                .collect(),
            equity_curve: equity_points(data, &run.equity_curve),
            warmup_bars: run.warmup_bars,
            out_of_money: run.out_of_money,
        }
    }
}
