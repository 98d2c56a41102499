//! Position: the net exposure derived from open trades.

use serde::{Deserialize, Serialize};

use super::trade::Trade;

/// Read-only snapshot of the account's net position.
///
/// Derived from the open trades on demand; never stored by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Signed sum of open trade sizes.
    pub size: f64,
    /// Unrealized profit of all open trades at the mark price.
    pub pl: f64,
    /// Size-weighted average return of the open trades.
    pub pl_pct: f64,
}

impl Position {
    pub fn from_trades(trades: &[Trade], mark: f64) -> Self {
        let size = trades.iter().map(Trade::size).sum();
        let pl = trades.iter().map(|t| t.pl(mark)).sum();

        let total_units: f64 = trades.iter().map(|t| t.size().abs()).sum();
        let pl_pct = if total_units > 0.0 {
            trades
                .iter()
                .map(|t| t.pl_pct(mark) * t.size().abs() / total_units)
                .sum()
        } else {
            0.0
        };

        Self { size, pl, pl_pct }
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TradeId;

    #[test]
    fn flat_when_no_trades() {
        let pos = Position::from_trades(&[], 100.0);
        assert!(pos.is_flat());
        assert_eq!(pos.pl, 0.0);
        assert_eq!(pos.pl_pct, 0.0);
    }

    #[test]
    fn aggregates_sizes_and_pl() {
        let trades = vec![
            Trade::open(TradeId(1), 3.0, 100.0, 0, 0.0, None),
            Trade::open(TradeId(2), 1.0, 120.0, 1, 0.0, None),
        ];
        let pos = Position::from_trades(&trades, 110.0);
        assert!(pos.is_long());
        assert_eq!(pos.size, 4.0);
        assert_eq!(pos.pl, 30.0 - 10.0);

        let expected = 0.75 * 0.10 + 0.25 * (110.0 / 120.0 - 1.0);
        assert!((pos.pl_pct - expected).abs() < 1e-12);
    }
}
