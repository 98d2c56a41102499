//! Typed strategy parameters and name-based overrides.
//!
//! Every strategy declares a `Params` struct. Overrides (from a config file or
//! an optimization grid) arrive as a name → JSON value map and are applied
//! through serde, so an unknown name or a wrongly typed value fails fast.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Named parameter values. Ordered so that fingerprints are stable.
pub type ParamSet = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("unknown strategy parameter '{0}'")]
    Unknown(String),

    #[error("invalid value for strategy parameter '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("strategy parameters must be a struct with named fields")]
    NotAStruct,

    #[error("failed to serialize strategy parameters: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Bounds every strategy parameter struct satisfies.
pub trait StrategyParams:
    Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static
{
}

impl<T> StrategyParams for T where
    T: Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static
{
}

/// Field names and current values of a parameter struct.
pub fn to_param_set<P: StrategyParams>(params: &P) -> Result<ParamSet, ParamError> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(ParamError::NotAStruct),
    }
}

/// Apply `overrides` on top of `base`.
///
/// Each override is checked on its own so the error names the offending
/// parameter.
pub fn apply_overrides<P: StrategyParams>(base: &P, overrides: &ParamSet) -> Result<P, ParamError> {
    let mut fields = match serde_json::to_value(base)? {
        Value::Object(map) => map,
        _ => return Err(ParamError::NotAStruct),
    };

    for (name, value) in overrides {
        if !fields.contains_key(name) {
            return Err(ParamError::Unknown(name.clone()));
        }
        fields.insert(name.clone(), value.clone());
        serde_json::from_value::<P>(Value::Object(fields.clone())).map_err(|e| {
            ParamError::Invalid {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| ParamError::Invalid {
        name: String::from("<all>"),
        reason: e.to_string(),
    })
}
