//! Look-ahead contamination tests.
//!
//! Invariant: nothing a strategy sees at bar t depends on bar t+1 or later.
//!
//! Two angles:
//! - Bundled indicators computed on a truncated series match the same prefix
//!   computed on the full series.
//! - During the run, every price column and indicator a strategy can reach
//!   ends at the current bar.

mod common;

use common::ts;
use tradesim_core::indicators::{Atr, Ema, Indicator, Sma};
use tradesim_core::strategy::{Context, InitContext, Strategy, StrategyError};
use tradesim_core::{run_backtest, Bar, BrokerConfig, PriceSeries};

/// Deterministic pseudo-random walk with realistic OHLC spread.
fn make_test_series(n: usize) -> PriceSeries {
    let mut price = 100.0;
    let bars = (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let change = ((seed % 200) as f64 - 100.0) * 0.05;
            price = (price + change).max(10.0);

            let open = price - 0.5;
            let close = price + 0.3;
            let high = open.max(close) + 2.0;
            let low = open.min(close) - 2.0;
            Bar::new(ts(i), open, high, low, close).with_volume(1_000.0 + i as f64)
        })
        .collect();
    PriceSeries::from_bars(bars).unwrap()
}

fn assert_no_lookahead(indicator: &dyn Indicator, data: &PriceSeries, truncated_len: usize) {
    let full = indicator.compute(data.full());
    let truncated = indicator.compute(data.view(truncated_len));

    assert_eq!(truncated.len(), truncated_len, "{}", indicator.name());
    assert_eq!(full.len(), data.len(), "{}", indicator.name());

    for i in 0..truncated_len {
        let (t, f) = (truncated[i], full[i]);
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            (t - f).abs() < 1e-10,
            "{}: value at bar {i} differs (truncated={t}, full={f})",
            indicator.name()
        );
    }
}

#[test]
fn sma_no_lookahead() {
    let data = make_test_series(200);
    assert_no_lookahead(&Sma::new(20), &data, 100);
}

#[test]
fn ema_no_lookahead() {
    let data = make_test_series(200);
    assert_no_lookahead(&Ema::new(12), &data, 100);
}

#[test]
fn atr_no_lookahead() {
    let data = make_test_series(200);
    assert_no_lookahead(&Atr::new(14), &data, 100);
}

// ── Runtime views ──

/// Registers indicators derived from the close, then checks at every bar that
/// the revealed data ends where the strategy is.
struct Probe {
    full_closes: Vec<f64>,
    seen: Vec<usize>,
}

impl Strategy for Probe {
    type Params = ();

    fn from_params(_: ()) -> Self {
        Self {
            full_closes: Vec::new(),
            seen: Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "probe"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), StrategyError> {
        self.full_closes = ctx.data().close().to_vec();
        ctx.indicator_fn("close_copy", |data| Ok(data.close().to_vec()))?;
        ctx.indicator_multi("close_and_lagged", |data| {
            let close = data.close();
            let mut lagged = vec![f64::NAN; 4];
            lagged.extend_from_slice(&close[..close.len() - 4]);
            Ok(vec![close.to_vec(), lagged])
        })?;
        Ok(())
    }

    fn next(&mut self, ctx: &mut Context<'_>) -> Result<(), StrategyError> {
        let i = ctx.index();
        let data = ctx.data();
        let indicators = ctx.indicators();

        assert_eq!(data.len(), i + 1);
        for column in [data.open(), data.high(), data.low(), data.close(), data.volume()] {
            assert_eq!(column.len(), i + 1);
        }
        assert_eq!(data.timestamps().len(), i + 1);
        assert_eq!(data.last_close(), Some(self.full_closes[i]));

        let copy = indicators.by_name("close_copy").expect("registered");
        assert_eq!(copy.len(), i + 1);
        assert_eq!(copy.last().copied(), data.last_close());
        assert_eq!(indicators.len(), i + 1);

        self.seen.push(i);
        Ok(())
    }
}

#[test]
fn strategy_views_end_at_current_bar() {
    let data = make_test_series(60);
    let mut probe = Probe::from_params(());

    let result = run_backtest(&data, &BrokerConfig::default(), &mut probe).unwrap();

    assert_eq!(result.warmup_bars, 5);
    assert_eq!(probe.seen, (5..60).collect::<Vec<_>>());
    assert_eq!(result.indicators.len(), 2);
}
