//! Trade: a filled, possibly still-open position slice.

use super::ids::{OrderId, TradeId};
use serde::{Deserialize, Serialize};

/// A filled position slice owned by the broker.
///
/// Prices are commission-adjusted fill prices, so `pl()` is net of costs.
/// `commission` accumulates the cost of both legs for this slice, which makes
/// `gross_pl() == pl() + commission` once the trade is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: TradeId,
    size: f64,
    entry_price: f64,
    entry_bar: usize,
    exit_price: Option<f64>,
    exit_bar: Option<usize>,
    sl: Option<f64>,
    tp: Option<f64>,
    sl_order: Option<OrderId>,
    tp_order: Option<OrderId>,
    commission: f64,
    tag: Option<String>,
}

impl Trade {
    pub(crate) fn open(
        id: TradeId,
        size: f64,
        entry_price: f64,
        entry_bar: usize,
        commission: f64,
        tag: Option<String>,
    ) -> Self {
        Self {
            id,
            size,
            entry_price,
            entry_bar,
            exit_price: None,
            exit_bar: None,
            sl: None,
            tp: None,
            sl_order: None,
            tp_order: None,
            commission,
            tag,
        }
    }

    /// Shrink this trade by `closed_size` units (same sign as the trade) and
    /// return the detached slice, which carries no bracket orders and its
    /// proportional share of the entry commission.
    pub(crate) fn split_off(&mut self, id: TradeId, closed_size: f64) -> Trade {
        debug_assert!(closed_size * self.size > 0.0);
        debug_assert!(closed_size.abs() < self.size.abs());

        let share = closed_size.abs() / self.size.abs();
        let slice_commission = self.commission * share;
        self.commission -= slice_commission;
        self.size -= closed_size;

        Trade {
            id,
            size: closed_size,
            entry_price: self.entry_price,
            entry_bar: self.entry_bar,
            exit_price: None,
            exit_bar: None,
            sl: self.sl,
            tp: self.tp,
            sl_order: None,
            tp_order: None,
            commission: slice_commission,
            tag: self.tag.clone(),
        }
    }

    /// Mark the trade closed at `exit_price` on `exit_bar`.
    pub(crate) fn close(mut self, exit_price: f64, exit_bar: usize, exit_commission: f64) -> Trade {
        self.exit_price = Some(exit_price);
        self.exit_bar = Some(exit_bar);
        self.commission += exit_commission;
        self.sl_order = None;
        self.tp_order = None;
        self
    }

    pub(crate) fn set_sl(&mut self, price: Option<f64>, order: Option<OrderId>) {
        self.sl = price;
        self.sl_order = order;
    }

    pub(crate) fn set_tp(&mut self, price: Option<f64>, order: Option<OrderId>) {
        self.tp = price;
        self.tp_order = order;
    }

    pub(crate) fn detach_order(&mut self, order: OrderId) {
        if self.sl_order == Some(order) {
            self.sl_order = None;
            self.sl = None;
        }
        if self.tp_order == Some(order) {
            self.tp_order = None;
            self.tp = None;
        }
    }

    pub fn id(&self) -> TradeId {
        self.id
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn entry_bar(&self) -> usize {
        self.entry_bar
    }

    pub fn exit_price(&self) -> Option<f64> {
        self.exit_price
    }

    pub fn exit_bar(&self) -> Option<usize> {
        self.exit_bar
    }

    pub fn sl(&self) -> Option<f64> {
        self.sl
    }

    pub fn tp(&self) -> Option<f64> {
        self.tp
    }

    pub fn sl_order(&self) -> Option<OrderId> {
        self.sl_order
    }

    pub fn tp_order(&self) -> Option<OrderId> {
        self.tp_order
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_closed(&self) -> bool {
        self.exit_bar.is_some()
    }

    /// Profit (positive) or loss (negative), valued at the exit price if
    /// closed, else at `mark`.
    pub fn pl(&self, mark: f64) -> f64 {
        let price = self.exit_price.unwrap_or(mark);
        self.size * (price - self.entry_price)
    }

    /// Signed return as a fraction of the entry price.
    pub fn pl_pct(&self, mark: f64) -> f64 {
        let price = self.exit_price.unwrap_or(mark);
        self.size.signum() * (price / self.entry_price - 1.0)
    }

    /// P&L before commission.
    pub fn gross_pl(&self, mark: f64) -> f64 {
        self.pl(mark) + self.commission
    }

    /// Absolute notional at `mark` (or the exit price if closed).
    pub fn value(&self, mark: f64) -> f64 {
        self.size.abs() * self.exit_price.unwrap_or(mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_trade() -> Trade {
        Trade::open(TradeId(1), 10.0, 100.0, 4, 2.0, Some("breakout".into()))
    }

    #[test]
    fn open_long_pl_marks_to_market() {
        let trade = long_trade();
        assert_eq!(trade.pl(110.0), 100.0);
        assert!((trade.pl_pct(110.0) - 0.10).abs() < 1e-12);
        assert!(!trade.is_closed());
    }

    #[test]
    fn short_pl_is_inverted() {
        let trade = Trade::open(TradeId(1), -5.0, 100.0, 0, 0.0, None);
        assert_eq!(trade.pl(90.0), 50.0);
        assert!((trade.pl_pct(90.0) - 0.10).abs() < 1e-12);
    }

    #[test]
    fn closed_trade_ignores_mark() {
        let trade = long_trade().close(105.0, 8, 1.0);
        assert!(trade.is_closed());
        assert_eq!(trade.exit_bar(), Some(8));
        assert_eq!(trade.pl(1_000.0), 50.0);
        assert_eq!(trade.commission(), 3.0);
        assert_eq!(trade.gross_pl(0.0), 53.0);
    }

    #[test]
    fn split_off_shares_commission_proportionally() {
        let mut trade = long_trade();
        let slice = trade.split_off(TradeId(2), 4.0);
        assert_eq!(trade.size(), 6.0);
        assert_eq!(slice.size(), 4.0);
        assert!((slice.commission() - 0.8).abs() < 1e-12);
        assert!((trade.commission() - 1.2).abs() < 1e-12);
        assert_eq!(slice.entry_bar(), 4);
        assert_eq!(slice.tag(), Some("breakout"));
        assert_eq!(slice.sl_order(), None);
    }

    #[test]
    fn detach_order_clears_matching_bracket() {
        let mut trade = long_trade();
        trade.set_sl(Some(95.0), Some(OrderId(7)));
        trade.set_tp(Some(120.0), Some(OrderId(8)));
        trade.detach_order(OrderId(7));
        assert_eq!(trade.sl(), None);
        assert_eq!(trade.sl_order(), None);
        assert_eq!(trade.tp_order(), Some(OrderId(8)));
    }
}
