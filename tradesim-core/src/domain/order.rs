//! Orders: pending instructions to transact, plus the strategy-facing request builder.

use super::ids::{OrderId, TradeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default order size: almost all available margin.
///
/// Slightly below 1.0 so the proportional-size branch is taken.
pub const FULL_EQUITY: f64 = 0.9999;

/// Order validation errors, raised at placement time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order size must be non-zero")]
    ZeroSize,

    #[error("size must be a positive fraction of equity in (0, 1) or a positive whole number of units, got {0}")]
    InvalidSize(f64),

    #[error("long orders require SL ({sl}) < LIMIT ({price}) < TP ({tp})")]
    InvalidLongPrices { sl: f64, price: f64, tp: f64 },

    #[error("short orders require TP ({tp}) < LIMIT ({price}) < SL ({sl})")]
    InvalidShortPrices { tp: f64, price: f64, sl: f64 },

    #[error("SL/TP price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("close portion must be in (0, 1], got {0}")]
    InvalidPortion(f64),

    #[error("{0} is not an open trade")]
    UnknownTrade(TradeId),

    #[error("{0} is not a pending order")]
    UnknownOrder(OrderId),

    #[error("no price has been observed yet; orders can only be placed from next()")]
    NoPrice,
}

/// A pending order in the broker's queue.
///
/// `size` is signed: positive is long, negative is short. A magnitude in
/// (0, 1) is a fraction of available margin, a magnitude >= 1 is a unit count.
/// An order with a parent trade is contingent: a stop-loss, a take-profit or
/// a (partial) close request for that trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    size: f64,
    limit: Option<f64>,
    stop: Option<f64>,
    sl: Option<f64>,
    tp: Option<f64>,
    parent_trade: Option<TradeId>,
    tag: Option<String>,
}

impl Order {
    pub(crate) fn new(id: OrderId, size: f64, parent_trade: Option<TradeId>) -> Self {
        Self {
            id,
            size,
            limit: None,
            stop: None,
            sl: None,
            tp: None,
            parent_trade,
            tag: None,
        }
    }

    pub(crate) fn with_prices(
        mut self,
        limit: Option<f64>,
        stop: Option<f64>,
        sl: Option<f64>,
        tp: Option<f64>,
    ) -> Self {
        self.limit = limit;
        self.stop = stop;
        self.sl = sl;
        self.tp = tp;
        self
    }

    pub(crate) fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    /// Once a stop is hit the order behaves as a plain market/limit order.
    pub(crate) fn clear_stop(&mut self) {
        self.stop = None;
    }

    /// Keep a bracket order's size equal to minus its trade's size.
    pub(crate) fn set_size(&mut self, size: f64) {
        self.size = size;
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn limit(&self) -> Option<f64> {
        self.limit
    }

    pub fn stop(&self) -> Option<f64> {
        self.stop
    }

    pub fn sl(&self) -> Option<f64> {
        self.sl
    }

    pub fn tp(&self) -> Option<f64> {
        self.tp
    }

    pub fn parent_trade(&self) -> Option<TradeId> {
        self.parent_trade
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

    pub fn is_contingent(&self) -> bool {
        self.parent_trade.is_some()
    }
}

/// Strategy-facing order description.
///
/// The side is chosen by the call (`open_long` / `open_short`); the request
/// only carries the unsigned size and the optional prices.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub(crate) size: f64,
    pub(crate) limit: Option<f64>,
    pub(crate) stop: Option<f64>,
    pub(crate) sl: Option<f64>,
    pub(crate) tp: Option<f64>,
    pub(crate) tag: Option<String>,
}

impl Default for OrderRequest {
    fn default() -> Self {
        Self {
            size: FULL_EQUITY,
            limit: None,
            stop: None,
            sl: None,
            tp: None,
            tag: None,
        }
    }
}

impl OrderRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn limit(mut self, price: f64) -> Self {
        self.limit = Some(price);
        self
    }

    pub fn stop(mut self, price: f64) -> Self {
        self.stop = Some(price);
        self
    }

    pub fn sl(mut self, price: f64) -> Self {
        self.sl = Some(price);
        self
    }

    pub fn tp(mut self, price: f64) -> Self {
        self.tp = Some(price);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Size must be a fraction in (0, 1) or a whole number >= 1.
    pub(crate) fn validate_size(&self) -> Result<(), OrderError> {
        let size = self.size;
        let fractional = size > 0.0 && size < 1.0;
        let whole = size >= 1.0 && size.is_finite() && size.fract() == 0.0;
        if fractional || whole {
            Ok(())
        } else {
            Err(OrderError::InvalidSize(size))
        }
    }
}

/// Check the SL < entry < TP ordering (mirrored for shorts).
///
/// `reference` is the limit, else the stop, else the commission-adjusted
/// last price.
pub(crate) fn validate_price_ordering(
    size: f64,
    reference: f64,
    sl: Option<f64>,
    tp: Option<f64>,
) -> Result<(), OrderError> {
    if size > 0.0 {
        let sl = sl.unwrap_or(f64::NEG_INFINITY);
        let tp = tp.unwrap_or(f64::INFINITY);
        if !(sl < reference && reference < tp) {
            return Err(OrderError::InvalidLongPrices {
                sl,
                price: reference,
                tp,
            });
        }
    } else {
        let tp = tp.unwrap_or(f64::NEG_INFINITY);
        let sl = sl.unwrap_or(f64::INFINITY);
        if !(tp < reference && reference < sl) {
            return Err(OrderError::InvalidShortPrices {
                tp,
                price: reference,
                sl,
            });
        }
    }
    Ok(())
}
