//! Broker configuration and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors, raised at construction before any bar is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial cash must be positive, got {0}")]
    NonPositiveCash(f64),

    #[error("relative commission must be in [0, 0.1), got {0}")]
    CommissionOutOfRange(f64),

    #[error("basis commission offset must be finite and non-negative, got {0}")]
    InvalidBasisOffset(f64),

    #[error("margin must be in (0, 1], got {0}")]
    MarginOutOfRange(f64),
}

/// How fees and slippage are folded into fill prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionModel {
    /// Fraction of price: buyers pay `price * (1 + rate)`, sellers receive `price * (1 - rate)`.
    Relative { rate: f64 },

    /// Absolute offset per unit: buyers pay `price + offset`, sellers receive `price - offset`.
    Basis { offset: f64 },
}

impl Default for CommissionModel {
    fn default() -> Self {
        CommissionModel::Relative { rate: 0.0 }
    }
}

impl CommissionModel {
    /// Price adjusted against the trader for an order of the given signed size.
    pub fn adjusted_price(&self, size: f64, price: f64) -> f64 {
        let direction = if size < 0.0 { -1.0 } else { 1.0 };
        match *self {
            CommissionModel::Relative { rate } => price * (1.0 + direction * rate),
            CommissionModel::Basis { offset } => price + direction * offset,
        }
    }

    /// Cash cost of the adjustment for `size` units filled at raw `price`.
    pub fn cost(&self, size: f64, price: f64) -> f64 {
        size.abs() * (self.adjusted_price(size, price) - price).abs()
    }
}

/// Broker account settings for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Initial cash.
    pub cash: f64,
    pub commission: CommissionModel,
    /// Margin ratio; leverage is `1 / margin`.
    pub margin: f64,
    /// Fill market orders at the previous bar's close instead of the current open.
    pub trade_on_close: bool,
    /// Allow simultaneous long and short trades instead of FIFO netting.
    pub hedging: bool,
    /// Each new stand-alone order cancels pending orders and closes open trades.
    pub exclusive_orders: bool,
    /// Close still-open trades after the last bar so they show up in statistics.
    pub finalize_trades: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            commission: CommissionModel::default(),
            margin: 1.0,
            trade_on_close: false,
            hedging: false,
            exclusive_orders: false,
            finalize_trades: true,
        }
    }
}

impl BrokerConfig {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            ..Self::default()
        }
    }

    pub fn with_commission(mut self, rate: f64) -> Self {
        self.commission = CommissionModel::Relative { rate };
        self
    }

    pub fn with_basis_commission(mut self, offset: f64) -> Self {
        self.commission = CommissionModel::Basis { offset };
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_trade_on_close(mut self, enabled: bool) -> Self {
        self.trade_on_close = enabled;
        self
    }

    pub fn with_hedging(mut self, enabled: bool) -> Self {
        self.hedging = enabled;
        self
    }

    pub fn with_exclusive_orders(mut self, enabled: bool) -> Self {
        self.exclusive_orders = enabled;
        self
    }

    pub fn with_finalize_trades(mut self, enabled: bool) -> Self {
        self.finalize_trades = enabled;
        self
    }

    pub fn leverage(&self) -> f64 {
        1.0 / self.margin
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cash > 0.0) || !self.cash.is_finite() {
            return Err(ConfigError::NonPositiveCash(self.cash));
        }
        match self.commission {
            CommissionModel::Relative { rate } => {
                if !(0.0..0.1).contains(&rate) {
                    return Err(ConfigError::CommissionOutOfRange(rate));
                }
            }
            CommissionModel::Basis { offset } => {
                if !(offset >= 0.0 && offset.is_finite()) {
                    return Err(ConfigError::InvalidBasisOffset(offset));
                }
            }
        }
        if !(self.margin > 0.0 && self.margin <= 1.0) {
            return Err(ConfigError::MarginOutOfRange(self.margin));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BrokerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.leverage(), 1.0);
        assert!(config.finalize_trades);
    }

    #[test]
    fn rejects_non_positive_cash() {
        assert_eq!(
            BrokerConfig::new(0.0).validate(),
            Err(ConfigError::NonPositiveCash(0.0))
        );
        assert!(BrokerConfig::new(-5.0).validate().is_err());
        assert!(BrokerConfig::new(f64::NAN).validate().is_err());
    }

    #[test]
    fn commission_bounds() {
        assert!(BrokerConfig::new(100.0).with_commission(0.099).validate().is_ok());
        assert_eq!(
            BrokerConfig::new(100.0).with_commission(0.1).validate(),
            Err(ConfigError::CommissionOutOfRange(0.1))
        );
        assert!(BrokerConfig::new(100.0).with_commission(-0.01).validate().is_err());
        assert!(BrokerConfig::new(100.0).with_basis_commission(-1.0).validate().is_err());
    }

    #[test]
    fn margin_bounds() {
        assert!(BrokerConfig::new(100.0).with_margin(1.0).validate().is_ok());
        assert!(BrokerConfig::new(100.0).with_margin(0.0).validate().is_err());
        assert!(BrokerConfig::new(100.0).with_margin(1.5).validate().is_err());
        assert_eq!(BrokerConfig::new(100.0).with_margin(0.5).leverage(), 2.0);
    }

    #[test]
    fn relative_adjustment_is_directional() {
        let model = CommissionModel::Relative { rate: 0.01 };
        assert!((model.adjusted_price(5.0, 100.0) - 101.0).abs() < 1e-12);
        assert!((model.adjusted_price(-5.0, 100.0) - 99.0).abs() < 1e-12);
        assert!((model.cost(-5.0, 100.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn basis_adjustment_adds_offset() {
        let model = CommissionModel::Basis { offset: 0.5 };
        assert_eq!(model.adjusted_price(1.0, 100.0), 100.5);
        assert_eq!(model.adjusted_price(-1.0, 100.0), 99.5);
        assert_eq!(model.cost(4.0, 100.0), 2.0);
    }

    #[test]
    fn config_roundtrips_through_toml_shape() {
        let json = r#"{"cash":5000.0,"commission":{"type":"BASIS","offset":0.25},"hedging":true}"#;
        let config: BrokerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cash, 5000.0);
        assert_eq!(config.commission, CommissionModel::Basis { offset: 0.25 });
        assert!(config.hedging);
        assert_eq!(config.margin, 1.0);
    }
}
