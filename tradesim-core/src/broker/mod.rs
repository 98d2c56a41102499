//! Broker: owns cash, pending orders and trades, and matches orders bar by bar.
//!
//! The broker is the only writer of account state. Strategies reach it through
//! the trading primitives on [`Context`](crate::strategy::Context); the engine
//! drives it once per bar through [`Broker::next`].
//!
//! Cash only changes when a trade (or a slice of one) closes. Equity is a
//! computed view: cash plus the unrealized P&L of open trades at the last close.

pub mod config;
mod matching;
pub mod trigger;

pub use config::{BrokerConfig, CommissionModel, ConfigError};

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::order::validate_price_ordering;
use crate::domain::{
    IdGen, Order, OrderError, OrderId, OrderRequest, Position, SeriesView, Trade, TradeId,
};
use trigger::BarPrices;

/// Outcome of one broker step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerStatus {
    Running,
    /// Equity fell to zero or below; the run must stop.
    OutOfMoney,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    StopLoss,
    TakeProfit,
}

/// Everything a finished broker leaves behind.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub cash: f64,
    /// Per-bar equity; `NaN` for bars the broker never processed.
    pub equity: Vec<f64>,
    /// Per-bar signed net position size.
    pub position_sizes: Vec<f64>,
    pub closed_trades: Vec<Trade>,
    pub open_trades: Vec<Trade>,
    pub ambiguous_fills: usize,
}

/// Simulated single-instrument brokerage account.
#[derive(Debug, Clone)]
pub struct Broker {
    config: BrokerConfig,
    leverage: f64,
    cash: f64,
    orders: VecDeque<Order>,
    trades: Vec<Trade>,
    closed_trades: Vec<Trade>,
    equity: Vec<f64>,
    position_sizes: Vec<f64>,
    last_price: Option<f64>,
    ids: IdGen,
    ambiguous_fills: usize,
}

impl Broker {
    /// Create a broker with history arrays sized for `n_bars` bars.
    pub fn new(config: BrokerConfig, n_bars: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            leverage: config.leverage(),
            cash: config.cash,
            config,
            orders: VecDeque::new(),
            trades: Vec::new(),
            closed_trades: Vec::new(),
            equity: vec![f64::NAN; n_bars],
            position_sizes: vec![0.0; n_bars],
            last_price: None,
            ids: IdGen::default(),
            ambiguous_fills: 0,
        })
    }

    // ── Account state ──

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Close of the most recently processed bar.
    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Cash plus unrealized P&L of all open trades.
    pub fn equity(&self) -> f64 {
        match self.last_price {
            Some(price) => self.cash + self.trades.iter().map(|t| t.pl(price)).sum::<f64>(),
            None => self.cash,
        }
    }

    /// Capital free to back new exposure: `max(0, equity - margin used)`.
    pub fn margin_available(&self) -> f64 {
        let price = self.last_price.unwrap_or(0.0);
        let margin_used: f64 = self
            .trades
            .iter()
            .map(|t| t.value(price) / self.leverage)
            .sum();
        (self.equity() - margin_used).max(0.0)
    }

    pub fn position(&self) -> Position {
        Position::from_trades(&self.trades, self.last_price.unwrap_or(0.0))
    }

    /// Pending orders in matching priority.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id() == id)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn trade(&self, id: TradeId) -> Option<&Trade> {
        self.trades.iter().find(|t| t.id() == id)
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn equity_curve(&self) -> &[f64] {
        &self.equity
    }

    pub fn position_sizes(&self) -> &[f64] {
        &self.position_sizes
    }

    /// Fills whose SL/TP also lay within the fill bar's range.
    pub fn ambiguous_fills(&self) -> usize {
        self.ambiguous_fills
    }

    pub fn into_ledger(self) -> Ledger {
        Ledger {
            cash: self.cash,
            equity: self.equity,
            position_sizes: self.position_sizes,
            closed_trades: self.closed_trades,
            open_trades: self.trades,
            ambiguous_fills: self.ambiguous_fills,
        }
    }

    // ── Trading primitives ──

    /// Place a long order. `req.size` must be a fraction in (0, 1) or a whole number.
    pub fn open_long(&mut self, req: OrderRequest) -> Result<OrderId, OrderError> {
        req.validate_size()?;
        self.new_order(req.size, req)
    }

    /// Place a short order. `req.size` must be a fraction in (0, 1) or a whole number.
    pub fn open_short(&mut self, req: OrderRequest) -> Result<OrderId, OrderError> {
        req.validate_size()?;
        self.new_order(-req.size, req)
    }

    /// Place a stand-alone order of signed `size`.
    ///
    /// Validates SL/TP ordering against the limit, else the stop, else the
    /// commission-adjusted last price. In exclusive-orders mode, pending
    /// stand-alone orders are canceled and every open trade is queued for
    /// closing first.
    pub fn new_order(&mut self, size: f64, req: OrderRequest) -> Result<OrderId, OrderError> {
        if size == 0.0 {
            return Err(OrderError::ZeroSize);
        }
        let reference = match req.limit.or(req.stop) {
            Some(price) => price,
            None => {
                let last = self.last_price.ok_or(OrderError::NoPrice)?;
                self.config.commission.adjusted_price(size, last)
            }
        };
        validate_price_ordering(size, reference, req.sl, req.tp)?;

        if self.config.exclusive_orders {
            self.orders.retain(Order::is_contingent);
            self.queue_close_all(1.0);
        }

        let id = self.ids.next_order_id();
        let order = Order::new(id, size, None)
            .with_prices(req.limit, req.stop, req.sl, req.tp)
            .with_tag(req.tag);
        self.orders.push_back(order);
        Ok(id)
    }

    /// Queue a close of `portion` (in (0, 1]) of an open trade, ahead of all
    /// other orders. At least one unit is closed.
    pub fn close_trade(&mut self, id: TradeId, portion: f64) -> Result<OrderId, OrderError> {
        if !(portion > 0.0 && portion <= 1.0) {
            return Err(OrderError::InvalidPortion(portion));
        }
        let trade = self.trade(id).ok_or(OrderError::UnknownTrade(id))?;
        let units = (trade.size().abs() * portion).round().max(1.0);
        let size = units.copysign(-trade.size());
        let tag = trade.tag().map(str::to_owned);

        let order_id = self.ids.next_order_id();
        self.orders
            .push_front(Order::new(order_id, size, Some(id)).with_tag(tag));
        Ok(order_id)
    }

    /// Queue a close of `portion` of every open trade.
    pub fn close_position(&mut self, portion: f64) -> Result<Vec<OrderId>, OrderError> {
        if !(portion > 0.0 && portion <= 1.0) {
            return Err(OrderError::InvalidPortion(portion));
        }
        Ok(self.queue_close_all(portion))
    }

    /// Cancel a pending order. Canceling a bracket order detaches it from its trade.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), OrderError> {
        let order = self.remove_order(id).ok_or(OrderError::UnknownOrder(id))?;
        if let Some(parent) = order.parent_trade() {
            if let Some(trade) = self.trades.iter_mut().find(|t| t.id() == parent) {
                trade.detach_order(id);
            }
        }
        Ok(())
    }

    /// Set, replace (`Some`) or remove (`None`) an open trade's stop-loss.
    pub fn set_trade_sl(&mut self, id: TradeId, price: Option<f64>) -> Result<(), OrderError> {
        self.edit_bracket(id, Bracket::StopLoss, price)
    }

    /// Set, replace (`Some`) or remove (`None`) an open trade's take-profit.
    pub fn set_trade_tp(&mut self, id: TradeId, price: Option<f64>) -> Result<(), OrderError> {
        self.edit_bracket(id, Bracket::TakeProfit, price)
    }

    // ── Per-bar step ──

    /// Match pending orders against the view's last bar, then record equity
    /// and position size for that bar.
    ///
    /// On equity <= 0, closes all trades at the last close, zeroes cash and the
    /// rest of the equity history, and reports [`BrokerStatus::OutOfMoney`].
    pub fn next(&mut self, view: SeriesView<'_>) -> BrokerStatus {
        let Some(i) = view.current_index() else {
            return BrokerStatus::Running;
        };
        let close = view.close();
        let open = view.open()[i];
        let bar = BarPrices {
            open,
            high: view.high()[i],
            low: view.low()[i],
            prev_close: if i > 0 { close[i - 1] } else { open },
        };
        self.last_price = Some(close[i]);

        self.process_orders(&bar, i);

        let equity = self.equity();
        if i < self.equity.len() {
            self.equity[i] = equity;
            self.position_sizes[i] = self.trades.iter().map(Trade::size).sum();
        }

        if equity <= 0.0 {
            while !self.trades.is_empty() {
                self.close_trade_at(0, close[i], i);
            }
            self.cash = 0.0;
            if i < self.equity.len() {
                self.equity[i..].fill(0.0);
                self.position_sizes[i..].fill(0.0);
            }
            warn!(bar = i, equity, "account out of money, stopping");
            return BrokerStatus::OutOfMoney;
        }
        BrokerStatus::Running
    }

    /// Queue closes for every open trade; they fill on the next broker step.
    pub fn finalize(&mut self) -> Vec<OrderId> {
        self.queue_close_all(1.0)
    }

    // ── Internals ──

    fn queue_close_all(&mut self, portion: f64) -> Vec<OrderId> {
        let ids: Vec<TradeId> = self.trades.iter().rev().map(Trade::id).collect();
        ids.into_iter()
            .filter_map(|id| self.close_trade(id, portion).ok())
            .collect()
    }

    fn edit_bracket(
        &mut self,
        id: TradeId,
        kind: Bracket,
        price: Option<f64>,
    ) -> Result<(), OrderError> {
        if let Some(p) = price {
            if !(p > 0.0 && p.is_finite()) {
                return Err(OrderError::InvalidPrice(p));
            }
        }
        if self.trade(id).is_none() {
            return Err(OrderError::UnknownTrade(id));
        }
        self.attach_bracket(id, kind, price);
        Ok(())
    }

    /// Replace a trade's SL or TP order. New bracket orders go to the front
    /// of the queue so they are matched before stand-alone orders.
    fn attach_bracket(&mut self, id: TradeId, kind: Bracket, price: Option<f64>) {
        let Some(idx) = self.trade_index(id) else {
            return;
        };
        let (previous, size, tag) = {
            let trade = &self.trades[idx];
            let previous = match kind {
                Bracket::StopLoss => trade.sl_order(),
                Bracket::TakeProfit => trade.tp_order(),
            };
            (previous, -trade.size(), trade.tag().map(str::to_owned))
        };
        if let Some(previous) = previous {
            self.remove_order(previous);
        }

        let order_id = price.map(|p| {
            let order_id = self.ids.next_order_id();
            let (limit, stop) = match kind {
                Bracket::StopLoss => (None, Some(p)),
                Bracket::TakeProfit => (Some(p), None),
            };
            let order = Order::new(order_id, size, Some(id))
                .with_prices(limit, stop, None, None)
                .with_tag(tag);
            self.orders.push_front(order);
            order_id
        });

        let trade = &mut self.trades[idx];
        match kind {
            Bracket::StopLoss => trade.set_sl(price, order_id),
            Bracket::TakeProfit => trade.set_tp(price, order_id),
        }
    }

    fn trade_index(&self, id: TradeId) -> Option<usize> {
        self.trades.iter().position(|t| t.id() == id)
    }

    fn remove_order(&mut self, id: OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id() == id)?;
        self.orders.remove(pos)
    }

    /// Open a trade at the adjusted `entry_price` and attach its brackets.
    /// TP is attached first so the SL ends up ahead of it in the queue.
    #[allow(clippy::too_many_arguments)]
    fn open_trade(
        &mut self,
        entry_price: f64,
        size: f64,
        sl: Option<f64>,
        tp: Option<f64>,
        bar: usize,
        tag: Option<String>,
        commission: f64,
    ) -> TradeId {
        let id = self.ids.next_trade_id();
        self.trades
            .push(Trade::open(id, size, entry_price, bar, commission, tag));
        if tp.is_some() {
            self.attach_bracket(id, Bracket::TakeProfit, tp);
        }
        if sl.is_some() {
            self.attach_bracket(id, Bracket::StopLoss, sl);
        }
        id
    }

    /// Reduce the trade at `idx` by signed `size` (opposite to the trade) at
    /// raw `price`. The closed part becomes its own trade with a fresh ID.
    fn reduce_trade(&mut self, idx: usize, price: f64, size: f64, bar: usize) {
        let size_left = self.trades[idx].size() + size;
        if size_left == 0.0 {
            self.close_trade_at(idx, price, bar);
            return;
        }

        let slice_id = self.ids.next_trade_id();
        let slice = self.trades[idx].split_off(slice_id, -size);
        let (sl_order, tp_order, remaining) = {
            let trade = &self.trades[idx];
            (trade.sl_order(), trade.tp_order(), trade.size())
        };
        for order in self.orders.iter_mut() {
            if Some(order.id()) == sl_order || Some(order.id()) == tp_order {
                order.set_size(-remaining);
            }
        }
        self.trades.push(slice);
        let last = self.trades.len() - 1;
        self.close_trade_at(last, price, bar);
    }

    /// Close the trade at `idx` at raw `price`, charging exit commission and
    /// crediting realized P&L to cash.
    fn close_trade_at(&mut self, idx: usize, price: f64, bar: usize) {
        let trade = self.trades.remove(idx);
        if let Some(id) = trade.sl_order() {
            self.remove_order(id);
        }
        if let Some(id) = trade.tp_order() {
            self.remove_order(id);
        }
        let exit_size = -trade.size();
        let exit_price = self.config.commission.adjusted_price(exit_size, price);
        let exit_cost = self.config.commission.cost(exit_size, price);

        let closed = trade.close(exit_price, bar, exit_cost);
        self.cash += closed.pl(exit_price);
        self.closed_trades.push(closed);
    }
}
