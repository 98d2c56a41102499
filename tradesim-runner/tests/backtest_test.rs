//! Integration tests for the `Backtest` entry point: runs, statistics and
//! result records on synthetic series.

mod common;

use common::{flat, rising, wave};
use serde_json::json;
use tradesim_core::strategy::examples::{BuyAndHold, BuyAndHoldParams, SmaCross, SmaCrossParams};
use tradesim_core::{BrokerConfig, ConfigError, EngineError, ParamError, ParamSet};
use tradesim_runner::{Backtest, RunError};

fn overrides(pairs: &[(&str, serde_json::Value)]) -> ParamSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn buy_and_hold_holds_until_the_last_bar() {
    let data = rising(10);
    let bt = Backtest::<BuyAndHold>::new(&data, BrokerConfig::new(10_000.0)).unwrap();
    let result = bt.run().unwrap();

    assert_eq!(result.strategy, "buy_and_hold");
    assert_eq!(result.trades.len(), 1);
    assert!(result.open_trades.is_empty());

    let trade = &result.trades[0];
    // Ordered on bar 1, filled at bar 2's open, finalized at the last open.
    assert_eq!(trade.entry_bar, 2);
    assert_eq!(trade.entry_price, 102.0);
    assert_eq!(trade.exit_bar, Some(9));
    assert_eq!(trade.exit_price, Some(109.0));
    assert_eq!(trade.size, (10_000.0_f64 * 0.9999 / 102.0).floor());
    assert!((trade.pnl - trade.size * 7.0).abs() < 1e-9);
    assert_eq!(trade.duration_bars, 7);
    assert_eq!(trade.entry_time, Some(common::ts(2)));

    let stats = &result.stats;
    assert_eq!(stats.trades, 1);
    assert_eq!(stats.bars, 10);
    assert!((stats.equity_final - (10_000.0 + trade.pnl)).abs() < 1e-9);
    assert!((stats.exposure_time_pct - 80.0).abs() < 1e-9);
    assert!((stats.win_rate_pct - 100.0).abs() < 1e-9);
    assert!((stats.buy_and_hold_return_pct - 9.0).abs() < 1e-9);
    assert!(stats.return_pct > 0.0);
    assert_eq!(stats.start, Some(common::ts(0)));
    assert_eq!(stats.end, Some(common::ts(9)));
}

#[test]
fn no_trades_report_zero_instead_of_nan() {
    let data = flat(60);
    let bt = Backtest::<SmaCross>::new(&data, BrokerConfig::new(10_000.0)).unwrap();
    let result = bt.run().unwrap();
    let stats = &result.stats;

    assert_eq!(stats.trades, 0);
    assert_eq!(stats.sqn, 0.0);
    assert_eq!(stats.sharpe, 0.0);
    assert_eq!(stats.sortino, 0.0);
    assert_eq!(stats.win_rate_pct, 0.0);
    assert_eq!(stats.profit_factor, 0.0);
    assert_eq!(stats.exposure_time_pct, 0.0);
    assert_eq!(stats.return_pct, 0.0);
    assert_eq!(stats.max_drawdown_pct, 0.0);
    assert_eq!(stats.equity_final, 10_000.0);
    for (label, value) in stats.rows() {
        assert!(!value.contains("NaN"), "{label} is NaN");
    }
}

#[test]
fn equity_curve_covers_every_bar() {
    let data = wave(120);
    let bt = Backtest::<SmaCross>::new(&data, BrokerConfig::new(10_000.0).with_commission(0.001))
        .unwrap();
    let result = bt.run().unwrap();

    assert_eq!(result.equity_curve.len(), 120);
    assert_eq!(result.warmup_bars, 20);
    for (i, point) in result.equity_curve.iter().enumerate() {
        assert_eq!(point.bar, i);
        assert_eq!(point.timestamp, common::ts(i));
        assert!(point.drawdown_pct >= 0.0 && point.drawdown_pct < 100.0);
    }
    // Warm-up bars are back-filled with the first recorded equity.
    assert!(result.equity_curve[..20].iter().all(|p| p.equity == 10_000.0));
    assert!(result.stats.trades > 0);
    assert!(result.stats.max_drawdown_pct <= 0.0);
    assert!(result.stats.max_drawdown_pct <= result.stats.avg_drawdown_pct);
}

#[test]
fn overrides_change_the_run_and_its_id() {
    let data = wave(150);
    let bt = Backtest::<SmaCross>::new(&data, BrokerConfig::new(10_000.0)).unwrap();

    let a = bt.run_with(&overrides(&[("fast", json!(5))])).unwrap();
    let b = bt.run_with(&overrides(&[("fast", json!(5))])).unwrap();
    let c = bt.run_with(&overrides(&[("fast", json!(8))])).unwrap();

    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.stats, b.stats);
    assert_ne!(a.run_id, c.run_id);
    assert_eq!(a.dataset_hash, c.dataset_hash);
    assert_eq!(a.params["fast"], json!(5));
    assert_eq!(a.params["slow"], json!(20));
}

#[test]
fn base_params_apply_to_every_run() {
    let data = wave(150);
    let bt = Backtest::<SmaCross>::new(&data, BrokerConfig::new(10_000.0))
        .unwrap()
        .with_params(SmaCrossParams {
            fast: 4,
            slow: 12,
            sl_pct: Some(0.03),
            ..SmaCrossParams::default()
        });

    let result = bt.run().unwrap();
    assert_eq!(result.params["slow"], json!(12));
    assert_eq!(result.params["sl_pct"], json!(0.03));
    assert_eq!(result.warmup_bars, 12);
    assert!(result.trades.iter().all(|t| t.sl.is_some()));
}

#[test]
fn unknown_or_mistyped_params_fail_fast() {
    let data = rising(10);
    let bt = Backtest::<SmaCross>::new(&data, BrokerConfig::default()).unwrap();

    match bt.run_with(&overrides(&[("fsat", json!(5))])) {
        Err(RunError::Params(ParamError::Unknown(name))) => assert_eq!(name, "fsat"),
        other => panic!("expected unknown parameter, got {other:?}"),
    }
    match bt.run_with(&overrides(&[("slow", json!("twenty"))])) {
        Err(RunError::Params(ParamError::Invalid { name, .. })) => assert_eq!(name, "slow"),
        other => panic!("expected invalid parameter, got {other:?}"),
    }
}

#[test]
fn invalid_broker_config_is_rejected_at_construction() {
    let data = rising(10);
    let err = Backtest::<BuyAndHold>::new(&data, BrokerConfig::new(1_000.0).with_commission(0.2))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RunError::Config(ConfigError::CommissionOutOfRange(_))
    ));
}

#[test]
fn order_errors_surface_as_engine_errors() {
    let data = rising(10);
    let bt = Backtest::<BuyAndHold>::new(&data, BrokerConfig::default())
        .unwrap()
        .with_params(BuyAndHoldParams { size: 1.5 });

    match bt.run() {
        Err(RunError::Engine(EngineError::Next { bar, .. })) => assert_eq!(bar, 1),
        other => panic!("expected a strategy error, got {other:?}"),
    }
}

#[test]
fn unfinalized_trades_are_reported_open() {
    let data = rising(10);
    let bt = Backtest::<BuyAndHold>::new(
        &data,
        BrokerConfig::new(10_000.0).with_finalize_trades(false),
    )
    .unwrap();
    let result = bt.run().unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.open_trades.len(), 1);
    let open = &result.open_trades[0];
    assert_eq!(open.exit_bar, None);
    assert_eq!(open.exit_price, None);
    // Marked at the last close.
    assert!((open.pnl - open.size * 7.0).abs() < 1e-9);
    assert_eq!(result.stats.trades, 0);
    assert!((result.stats.exposure_time_pct - 80.0).abs() < 1e-9);
}
