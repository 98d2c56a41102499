//! Bar-by-bar event loop: the heart of the backtesting engine.
//!
//! Per bar, after the warm-up:
//! 1. Reveal price data and indicators up to the current bar
//! 2. Broker matches pending orders and records equity
//! 3. Strategy decides, possibly placing or canceling orders

use tracing::debug;

use crate::broker::{Broker, BrokerConfig, BrokerStatus};
use crate::domain::PriceSeries;
use crate::indicators::IndicatorSet;
use crate::strategy::{Context, InitContext, Strategy};

use super::state::{backfill, EngineError, RunResult};
use super::warmup::compute_warmup;

/// Run one backtest of `strategy` over `data`.
///
/// The run is synchronous and single-threaded. It ends early only when the
/// account runs out of money; the partial result is still returned.
pub fn run_backtest<S: Strategy>(
    data: &PriceSeries,
    config: &BrokerConfig,
    strategy: &mut S,
) -> Result<RunResult, EngineError> {
    let n = data.len();
    let mut broker = Broker::new(config.clone(), n)?;

    let mut indicators = IndicatorSet::new(n);
    strategy
        .init(&mut InitContext::new(data.full(), &mut indicators))
        .map_err(EngineError::Init)?;

    let start = compute_warmup(&indicators);
    debug!(
        strategy = strategy.name(),
        bars = n,
        warmup = start,
        indicators = indicators.len(),
        "backtest started"
    );

    let mut out_of_money = None;
    for i in start..n {
        let view = data.view(i + 1);
        if broker.next(view) == BrokerStatus::OutOfMoney {
            out_of_money = Some(i);
            break;
        }
        let mut ctx = Context::new(view, indicators.view(i + 1), &mut broker);
        strategy
            .next(&mut ctx)
            .map_err(|source| EngineError::Next { bar: i, source })?;
    }

    // Close what is still open so it shows up in the statistics, and let the
    // broker act on orders placed during the last `next()`.
    if out_of_money.is_none() && config.finalize_trades && start < n {
        broker.finalize();
        if broker.next(data.full()) == BrokerStatus::OutOfMoney {
            out_of_money = Some(n - 1);
        }
    }

    let ledger = broker.into_ledger();
    debug!(
        strategy = strategy.name(),
        trades = ledger.closed_trades.len(),
        cash = ledger.cash,
        out_of_money = out_of_money.is_some(),
        "backtest finished"
    );

    Ok(RunResult {
        equity_curve: backfill(ledger.equity, ledger.cash),
        position_sizes: ledger.position_sizes,
        trades: ledger.closed_trades,
        open_trades: ledger.open_trades,
        final_cash: ledger.cash,
        warmup_bars: start,
        bar_count: n,
        out_of_money,
        ambiguous_fills: ledger.ambiguous_fills,
        indicators,
    })
}
