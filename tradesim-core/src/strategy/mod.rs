//! Strategy capability interface.
//!
//! The engine calls [`Strategy::init`] once with the full history visible, then
//! [`Strategy::next`] once per bar with only the bars up to the current one.
//! Strategies trade exclusively through the primitives on [`Context`].

pub mod examples;
pub mod params;

pub use params::{apply_overrides, to_param_set, ParamError, ParamSet, StrategyParams};

use thiserror::Error;

use crate::broker::Broker;
use crate::domain::{
    Order, OrderError, OrderId, OrderRequest, Position, SeriesView, Trade, TradeId,
};
use crate::indicators::{BoxError, Indicator, IndicatorError, IndicatorId, IndicatorSet, IndicatorView};

/// Errors a strategy hook may return. Any error aborts the run.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("{0}")]
    Custom(String),
}

/// User-supplied decision logic.
///
/// # Invariants
/// - `next()` sees no price or indicator data beyond the current bar.
/// - Given the same data and parameters, decisions are deterministic.
pub trait Strategy: Send {
    type Params: StrategyParams;

    /// Build a strategy instance from its typed parameters.
    fn from_params(params: Self::Params) -> Self
    where
        Self: Sized;

    /// Strategy name for logs and reports.
    fn name(&self) -> &str;

    /// Called once before the bar loop with the full history visible.
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), StrategyError>;

    /// Called once per bar after the broker has matched orders on it.
    fn next(&mut self, ctx: &mut Context<'_>) -> Result<(), StrategyError>;
}

// ── Init phase ──

/// What a strategy sees in `init`: the full history and indicator registration.
pub struct InitContext<'a> {
    data: SeriesView<'a>,
    indicators: &'a mut IndicatorSet,
}

impl<'a> InitContext<'a> {
    pub fn new(data: SeriesView<'a>, indicators: &'a mut IndicatorSet) -> Self {
        Self { data, indicators }
    }

    pub fn data(&self) -> SeriesView<'a> {
        self.data
    }

    /// Compute and register a bundled indicator.
    pub fn indicator(&mut self, indicator: &dyn Indicator) -> Result<IndicatorId, IndicatorError> {
        let values = indicator.compute(self.data);
        self.indicators.insert(indicator.name(), vec![values])
    }

    /// Compute and register a single-series indicator from a closure.
    pub fn indicator_fn<F>(&mut self, name: &str, f: F) -> Result<IndicatorId, IndicatorError>
    where
        F: FnOnce(SeriesView<'a>) -> Result<Vec<f64>, BoxError>,
    {
        self.indicator_multi(name, |data| f(data).map(|values| vec![values]))
    }

    /// Compute and register a multi-dimensional indicator from a closure.
    pub fn indicator_multi<F>(&mut self, name: &str, f: F) -> Result<IndicatorId, IndicatorError>
    where
        F: FnOnce(SeriesView<'a>) -> Result<Vec<Vec<f64>>, BoxError>,
    {
        let dimensions = f(self.data).map_err(|source| IndicatorError::Compute {
            name: name.to_string(),
            source,
        })?;
        self.indicators.insert(name, dimensions)
    }
}

// ── Per-bar phase ──

/// What a strategy sees in `next`: revealed data, revealed indicators and the
/// broker's trading primitives.
pub struct Context<'a> {
    data: SeriesView<'a>,
    indicators: IndicatorView<'a>,
    broker: &'a mut Broker,
}

impl<'a> Context<'a> {
    pub fn new(data: SeriesView<'a>, indicators: IndicatorView<'a>, broker: &'a mut Broker) -> Self {
        Self {
            data,
            indicators,
            broker,
        }
    }

    pub fn data(&self) -> SeriesView<'a> {
        self.data
    }

    pub fn indicators(&self) -> IndicatorView<'a> {
        self.indicators
    }

    /// Index of the current bar.
    pub fn index(&self) -> usize {
        self.data.len().saturating_sub(1)
    }

    pub fn broker(&self) -> &Broker {
        self.broker
    }

    pub fn equity(&self) -> f64 {
        self.broker.equity()
    }

    pub fn cash(&self) -> f64 {
        self.broker.cash()
    }

    pub fn position(&self) -> Position {
        self.broker.position()
    }

    pub fn trades(&self) -> &[Trade] {
        self.broker.trades()
    }

    pub fn closed_trades(&self) -> &[Trade] {
        self.broker.closed_trades()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.broker.orders()
    }

    pub fn open_long(&mut self, req: OrderRequest) -> Result<OrderId, OrderError> {
        self.broker.open_long(req)
    }

    pub fn open_short(&mut self, req: OrderRequest) -> Result<OrderId, OrderError> {
        self.broker.open_short(req)
    }

    /// Shorthand for `open_long(OrderRequest::new())`: almost all available margin.
    pub fn buy(&mut self) -> Result<OrderId, OrderError> {
        self.open_long(OrderRequest::new())
    }

    /// Shorthand for `open_short(OrderRequest::new())`.
    pub fn sell(&mut self) -> Result<OrderId, OrderError> {
        self.open_short(OrderRequest::new())
    }

    pub fn close_trade(&mut self, id: TradeId, portion: f64) -> Result<OrderId, OrderError> {
        self.broker.close_trade(id, portion)
    }

    pub fn close_position(&mut self, portion: f64) -> Result<Vec<OrderId>, OrderError> {
        self.broker.close_position(portion)
    }

    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), OrderError> {
        self.broker.cancel_order(id)
    }

    pub fn set_trade_sl(&mut self, id: TradeId, price: Option<f64>) -> Result<(), OrderError> {
        self.broker.set_trade_sl(id, price)
    }

    pub fn set_trade_tp(&mut self, id: TradeId, price: Option<f64>) -> Result<(), OrderError> {
        self.broker.set_trade_tp(id, price)
    }
}

/// True if `a` crossed above `b` on the last bar.
pub fn crossover(a: &[f64], b: &[f64]) -> bool {
    match (a, b) {
        ([.., a0, a1], [.., b0, b1]) => a0 < b0 && a1 > b1,
        _ => false,
    }
}
