//! Per-bar order matching.
//!
//! Orders are matched in queue order against a snapshot of the queue taken at
//! the start of the pass; orders removed during the pass (e.g. the brackets of
//! a trade that was just closed) are skipped. A market order that opens a
//! trade with brackets forces another pass so its SL/TP can trigger on the
//! same bar. Each order is evaluated at most once per bar; a repass only
//! matches orders created by the previous pass.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::trigger::{self, BarPrices};
use super::Broker;
use crate::domain::{Order, OrderId};

impl Broker {
    pub(super) fn process_orders(&mut self, bar: &BarPrices, i: usize) {
        let mut evaluated = HashSet::new();
        while self.matching_pass(bar, i, &mut evaluated) {}
    }

    /// One pass over the queue. Returns true if another pass is needed.
    fn matching_pass(
        &mut self,
        bar: &BarPrices,
        i: usize,
        evaluated: &mut HashSet<OrderId>,
    ) -> bool {
        let mut repass = false;
        let snapshot: Vec<OrderId> = self.orders.iter().map(|o| o.id()).collect();

        for order_id in snapshot {
            if !evaluated.insert(order_id) {
                continue;
            }
            let Some(pos) = self.orders.iter().position(|o| o.id() == order_id) else {
                continue;
            };
            let order = self.orders[pos].clone();
            let is_long = order.is_long();

            // Stop trigger: once hit, the order is a plain market/limit order.
            let stop_hit = match order.stop() {
                Some(stop) => {
                    if !trigger::stop_hit(is_long, stop, bar) {
                        continue;
                    }
                    self.orders[pos].clear_stop();
                    Some(stop)
                }
                None => None,
            };

            let price = match order.limit() {
                Some(limit) => {
                    if !trigger::limit_hit(is_long, limit, bar)
                        || trigger::limit_before_stop(is_long, limit, stop_hit)
                    {
                        continue;
                    }
                    trigger::limit_fill_price(is_long, limit, stop_hit, bar)
                }
                None => {
                    let on_prev_close = self.config.trade_on_close && !order.is_contingent();
                    trigger::market_fill_price(is_long, stop_hit, on_prev_close, bar)
                }
            };

            let is_market = order.limit().is_none() && stop_hit.is_none();
            let fill_bar = if is_market && self.config.trade_on_close && !order.is_contingent() {
                i.saturating_sub(1)
            } else {
                i
            };

            // Contingent orders reduce or close their parent trade.
            if let Some(parent) = order.parent_trade() {
                if let Some(idx) = self.trade_index(parent) {
                    let trade_size = self.trades[idx].size();
                    let size = trade_size.abs().min(order.size().abs()).copysign(order.size());
                    self.reduce_trade(idx, price, size, fill_bar);
                }
                self.remove_order(order_id);
                continue;
            }

            let commission = self.config.commission;
            let adjusted = commission.adjusted_price(order.size(), price);
            if !(adjusted.is_finite() && adjusted > 0.0) {
                warn!(
                    order = %order_id,
                    price,
                    adjusted,
                    "commission leaves no positive fill price, order canceled"
                );
                self.remove_order(order_id);
                continue;
            }

            let mut size = order.size();
            if size.abs() < 1.0 {
                let units = (self.margin_available() * self.leverage * size.abs() / adjusted).floor();
                if units <= 0.0 {
                    warn!(
                        order = %order_id,
                        size,
                        price = adjusted,
                        margin_available = self.margin_available(),
                        "insufficient margin for a single unit, order canceled"
                    );
                    self.remove_order(order_id);
                    continue;
                }
                size = units.copysign(size);
            }
            let mut need = size;

            if !self.config.hedging {
                // FIFO-close opposite trades; the remainder opens a new trade.
                let mut idx = 0;
                while idx < self.trades.len() && need != 0.0 {
                    let trade_size = self.trades[idx].size();
                    if (trade_size > 0.0) == is_long {
                        idx += 1;
                        continue;
                    }
                    if need.abs() >= trade_size.abs() {
                        self.close_trade_at(idx, price, fill_bar);
                        need += trade_size;
                    } else {
                        self.reduce_trade(idx, price, need, fill_bar);
                        need = 0.0;
                    }
                }
            }

            if need.abs() * adjusted > self.margin_available() * self.leverage {
                debug!(
                    order = %order_id,
                    units = need,
                    price = adjusted,
                    "order exceeds available margin, canceled"
                );
                self.remove_order(order_id);
                continue;
            }

            if need != 0.0 {
                let entry_cost = commission.cost(need, price);
                self.open_trade(
                    adjusted,
                    need,
                    order.sl(),
                    order.tp(),
                    fill_bar,
                    order.tag().map(str::to_owned),
                    entry_cost,
                );

                if order.sl().is_some() || order.tp().is_some() {
                    if is_market {
                        repass = true;
                    } else if self.stop_then_tp_unambiguous(&order, stop_hit, bar) {
                        repass = true;
                    } else if order.sl().is_some_and(|p| bar.contains(p))
                        || order.tp().is_some_and(|p| bar.contains(p))
                    {
                        self.ambiguous_fills += 1;
                        warn!(
                            order = %order_id,
                            bar = i,
                            "stop/limit order filled on a bar that also spans its SL/TP; \
                             bracket not evaluated until the next bar"
                        );
                    }
                }
            }

            self.remove_order(order_id);
        }

        repass
    }

    /// A stop-market entry whose TP was also reached on this bar, with its SL
    /// untouched: both moves go the same way, so the TP may fill this bar.
    fn stop_then_tp_unambiguous(
        &self,
        order: &Order,
        stop_hit: Option<f64>,
        bar: &BarPrices,
    ) -> bool {
        if stop_hit.is_none() || order.limit().is_some() {
            return false;
        }
        let Some(tp) = order.tp() else {
            return false;
        };
        let exit_long = !order.is_long();
        trigger::limit_hit(exit_long, tp, bar)
            && !order
                .sl()
                .is_some_and(|sl| trigger::stop_hit(exit_long, sl, bar))
    }
}
