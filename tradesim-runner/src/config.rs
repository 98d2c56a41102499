//! TOML run configuration.
//!
//! ```toml
//! [broker]
//! cash = 10000.0
//! commission = { type = "RELATIVE", rate = 0.002 }
//! margin = 1.0
//!
//! [strategy]
//! name = "sma_cross"
//! params = { fast = 10, slow = 20 }
//!
//! [optimize]
//! maximize = "sqn"
//! max_tries = 0.5
//! random_seed = 7
//! params = { fast = [5, 10, 15], slow = [20, 40] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tradesim_core::{BrokerConfig, ParamSet};

use crate::fitness::FitnessMetric;
use crate::optimize::MaxTries;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Broker(#[from] tradesim_core::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Serializable configuration for a backtest or an optimization sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    pub strategy: StrategySection,
    #[serde(default)]
    pub optimize: Option<OptimizeSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub name: String,
    /// Overrides on top of the strategy's default parameters.
    #[serde(default)]
    pub params: ParamSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeSection {
    #[serde(default)]
    pub maximize: FitnessMetric,
    #[serde(default)]
    pub max_tries: Option<MaxTries>,
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Candidate values per parameter name.
    pub params: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub return_heatmap: bool,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker.validate()?;
        if self.strategy.name.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy name is empty".into()));
        }
        if let Some(opt) = &self.optimize {
            if opt.params.is_empty() {
                return Err(ConfigError::Invalid(
                    "[optimize] needs at least one parameter".into(),
                ));
            }
            if let Some((name, _)) = opt.params.iter().find(|(_, values)| values.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "optimization parameter '{name}' has no values"
                )));
            }
            if let Some(tries) = opt.max_tries {
                tries
                    .validate()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tradesim_core::CommissionModel;

    const FULL: &str = r#"
        [broker]
        cash = 5000.0
        commission = { type = "RELATIVE", rate = 0.002 }
        margin = 0.5
        exclusive_orders = true

        [strategy]
        name = "sma_cross"
        params = { fast = 5, sl_pct = 0.05 }

        [optimize]
        maximize = "Sharpe Ratio"
        max_tries = 0.5
        random_seed = 7
        params = { fast = [5, 10], slow = [20, 30, 40] }
        return_heatmap = true
    "#;

    #[test]
    fn parses_every_section() {
        let config = RunConfig::from_toml_str(FULL).unwrap();

        assert_eq!(config.broker.cash, 5000.0);
        assert_eq!(config.broker.commission, CommissionModel::Relative { rate: 0.002 });
        assert_eq!(config.broker.margin, 0.5);
        assert!(config.broker.exclusive_orders);
        assert!(config.broker.finalize_trades);

        assert_eq!(config.strategy.name, "sma_cross");
        assert_eq!(config.strategy.params["fast"], json!(5));
        assert_eq!(config.strategy.params["sl_pct"], json!(0.05));

        let opt = config.optimize.unwrap();
        assert_eq!(opt.maximize, FitnessMetric::Sharpe);
        assert_eq!(opt.max_tries, Some(MaxTries::Fraction(0.5)));
        assert_eq!(opt.random_seed, Some(7));
        assert_eq!(opt.params["slow"].len(), 3);
        assert!(opt.return_heatmap);
    }

    #[test]
    fn broker_section_is_optional() {
        let config = RunConfig::from_toml_str("[strategy]\nname = \"buy_and_hold\"\n").unwrap();
        assert_eq!(config.broker, BrokerConfig::default());
        assert!(config.strategy.params.is_empty());
        assert!(config.optimize.is_none());
    }

    #[test]
    fn rejects_invalid_broker() {
        let err = RunConfig::from_toml_str(
            "[broker]\ncash = -1.0\n[strategy]\nname = \"buy_and_hold\"\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Broker(tradesim_core::ConfigError::NonPositiveCash(_))
        ));
    }

    #[test]
    fn rejects_empty_value_list() {
        let err = RunConfig::from_toml_str(
            "[strategy]\nname = \"sma_cross\"\n[optimize]\nparams = { fast = [] }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn rejects_unknown_metric() {
        let err = RunConfig::from_toml_str(
            "[strategy]\nname = \"sma_cross\"\n[optimize]\nmaximize = \"alpha\"\nparams = { fast = [5] }\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = RunConfig::load(Path::new("/nonexistent/tradesim.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tradesim.toml"));
    }
}
