//! Run fingerprinting: deterministic identification of datasets and runs.
//!
//! - `DatasetHash`: BLAKE3 over every timestamp and OHLCV value of a series.
//! - `RunId`: BLAKE3 over strategy name, broker config, parameters and dataset hash.
//!
//! Two runs with the same `RunId` are guaranteed to produce identical results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::broker::{BrokerConfig, CommissionModel};
use crate::domain::PriceSeries;
use crate::strategy::ParamSet;

/// Content hash of a price series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(series: &PriceSeries) -> Self {
        let view = series.full();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(view.len() as u64).to_le_bytes());
        for ts in view.timestamps() {
            hasher.update(&ts.and_utc().timestamp_micros().to_le_bytes());
        }
        for column in [view.open(), view.high(), view.low(), view.close(), view.volume()] {
            for v in column {
                hasher.update(&v.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(
        strategy: &str,
        config: &BrokerConfig,
        params: &ParamSet,
        dataset: &DatasetHash,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(strategy.as_bytes());
        hasher.update(&[0]);

        hasher.update(&config.cash.to_bits().to_le_bytes());
        match config.commission {
            CommissionModel::Relative { rate } => {
                hasher.update(b"relative");
                hasher.update(&rate.to_bits().to_le_bytes());
            }
            CommissionModel::Basis { offset } => {
                hasher.update(b"basis");
                hasher.update(&offset.to_bits().to_le_bytes());
            }
        }
        hasher.update(&config.margin.to_bits().to_le_bytes());
        hasher.update(&[
            config.trade_on_close as u8,
            config.hedging as u8,
            config.exclusive_orders as u8,
            config.finalize_trades as u8,
        ]);

        // BTreeMap iteration order is sorted, so this is canonical.
        for (name, value) in params {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
            hasher.update(&[0]);
        }

        hasher.update(dataset.0.as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
