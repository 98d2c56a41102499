//! Trigger checking: does a bar trigger a given order, and at what raw price?
//!
//! All comparisons are strict: a price exactly at the bar's high or low does
//! not trigger. Prices returned here are raw; commission adjustment happens in
//! [`CommissionModel`](super::CommissionModel).

/// The OHLC values of the bar being matched, plus the previous close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarPrices {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Close of the bar before the current one (trade-on-close fills).
    pub prev_close: f64,
}

impl BarPrices {
    /// Whether `price` lies within the bar's range (inclusive).
    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Buy stops trigger on a rise above the stop, sell stops on a fall below it.
pub fn stop_hit(is_long: bool, stop: f64, bar: &BarPrices) -> bool {
    if is_long {
        bar.high > stop
    } else {
        bar.low < stop
    }
}

/// Buy limits fill on a dip below the limit, sell limits on a rise above it.
pub fn limit_hit(is_long: bool, limit: f64, bar: &BarPrices) -> bool {
    if is_long {
        bar.low < limit
    } else {
        bar.high > limit
    }
}

/// Stop and limit both reachable within the bar, with the limit on the far
/// side of the stop: assume the limit was touched before the stop made the
/// order live, so the order must not fill this bar.
///
/// `stop_hit_this_bar` is the stop price that triggered on this bar, if any.
pub fn limit_before_stop(is_long: bool, limit: f64, stop_hit_this_bar: Option<f64>) -> bool {
    match stop_hit_this_bar {
        None => false,
        Some(stop) if is_long => limit < stop,
        Some(stop) => limit > stop,
    }
}

/// Raw fill price of a limit order whose limit was hit.
pub fn limit_fill_price(
    is_long: bool,
    limit: f64,
    stop_hit_this_bar: Option<f64>,
    bar: &BarPrices,
) -> f64 {
    if is_long {
        bar.open
            .min(limit)
            .min(stop_hit_this_bar.unwrap_or(f64::INFINITY))
    } else {
        bar.open
            .max(limit)
            .max(stop_hit_this_bar.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Raw fill price of a market (or triggered stop-market) order.
///
/// Contingent orders always fill at the open, even in trade-on-close mode.
pub fn market_fill_price(
    is_long: bool,
    stop_hit_this_bar: Option<f64>,
    fill_on_prev_close: bool,
    bar: &BarPrices,
) -> f64 {
    let base = if fill_on_prev_close {
        bar.prev_close
    } else {
        bar.open
    };
    match stop_hit_this_bar {
        Some(stop) if is_long => base.max(stop),
        Some(stop) => base.min(stop),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64) -> BarPrices {
        BarPrices {
            open,
            high,
            low,
            prev_close: 99.5,
        }
    }

    #[test]
    fn stop_hit_is_strict() {
        let b = bar(100.0, 105.0, 95.0);
        assert!(stop_hit(true, 104.0, &b));
        assert!(!stop_hit(true, 105.0, &b));
        assert!(stop_hit(false, 96.0, &b));
        assert!(!stop_hit(false, 95.0, &b));
    }

    #[test]
    fn limit_hit_is_strict() {
        let b = bar(100.0, 105.0, 95.0);
        assert!(limit_hit(true, 96.0, &b));
        assert!(!limit_hit(true, 95.0, &b));
        assert!(limit_hit(false, 104.0, &b));
        assert!(!limit_hit(false, 105.0, &b));
    }

    #[test]
    fn limit_before_stop_only_when_stop_hit_this_bar() {
        assert!(limit_before_stop(true, 99.0, Some(100.0)));
        assert!(!limit_before_stop(true, 101.0, Some(100.0)));
        assert!(!limit_before_stop(true, 99.0, None));
        assert!(limit_before_stop(false, 101.0, Some(100.0)));
        assert!(!limit_before_stop(false, 99.0, Some(100.0)));
    }

    #[test]
    fn limit_fill_takes_better_of_open_and_limit() {
        // Gapped down through a buy limit: fill at the open.
        assert_eq!(limit_fill_price(true, 99.0, None, &bar(97.0, 100.0, 96.0)), 97.0);
        assert_eq!(limit_fill_price(true, 99.0, None, &bar(100.0, 101.0, 98.0)), 99.0);
        assert_eq!(limit_fill_price(false, 101.0, None, &bar(103.0, 104.0, 100.0)), 103.0);
        assert_eq!(limit_fill_price(false, 101.0, None, &bar(100.0, 102.0, 99.0)), 101.0);
    }

    #[test]
    fn market_fill_clamped_by_stop() {
        let b = bar(100.0, 106.0, 99.0);
        assert_eq!(market_fill_price(true, None, false, &b), 100.0);
        assert_eq!(market_fill_price(true, Some(104.0), false, &b), 104.0);
        assert_eq!(market_fill_price(false, Some(104.0), false, &b), 100.0);
        assert_eq!(market_fill_price(true, None, true, &b), 99.5);
    }

    #[test]
    fn contains_is_inclusive() {
        let b = bar(100.0, 105.0, 95.0);
        assert!(b.contains(95.0));
        assert!(b.contains(105.0));
        assert!(!b.contains(105.5));
    }
}
