//! Shared fixtures for core integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tradesim_core::strategy::{Context, InitContext, Strategy, StrategyError};
use tradesim_core::{Bar, PriceSeries};

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

/// Series from explicit (open, high, low, close) tuples.
pub fn ohlc(rows: &[(f64, f64, f64, f64)]) -> PriceSeries {
    let bars = rows
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar::new(ts(i), o, h, l, c))
        .collect();
    PriceSeries::from_bars(bars).unwrap()
}

/// Series where every bar is `price` with a one-point range.
pub fn flat(n: usize, price: f64) -> PriceSeries {
    ohlc(&vec![(price, price + 1.0, price - 1.0, price); n])
}

type Hook = Box<dyn FnMut(&mut Context<'_>) -> Result<(), StrategyError> + Send>;

/// Strategy driven by a closure, for scripting order flow bar by bar.
pub struct Scripted {
    hook: Hook,
    pub calls: Vec<usize>,
}

impl Scripted {
    pub fn new(
        hook: impl FnMut(&mut Context<'_>) -> Result<(), StrategyError> + Send + 'static,
    ) -> Self {
        Self {
            hook: Box::new(hook),
            calls: Vec::new(),
        }
    }
}

impl Strategy for Scripted {
    type Params = ();

    fn from_params(_: ()) -> Self {
        Scripted::new(|_| Ok(()))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn next(&mut self, ctx: &mut Context<'_>) -> Result<(), StrategyError> {
        self.calls.push(ctx.index());
        (self.hook)(ctx)
    }
}
