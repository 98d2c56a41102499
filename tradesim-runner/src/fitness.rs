//! Fitness function: the objective an optimization sweep maximizes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::Stats;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown metric '{0}' (expected one of: {names})", names = FitnessMetric::NAMES.join(", "))]
pub struct UnknownMetric(pub String);

/// A named statistic to maximize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FitnessMetric {
    #[default]
    Sqn,
    Sharpe,
    Sortino,
    Calmar,
    ReturnPct,
    EquityFinal,
    WinRate,
    ProfitFactor,
    Expectancy,
    Kelly,
    /// Negative percentage, so maximizing it minimizes the drawdown.
    MaxDrawdown,
}

impl FitnessMetric {
    pub const NAMES: [&'static str; 11] = [
        "sqn",
        "sharpe",
        "sortino",
        "calmar",
        "return_pct",
        "equity_final",
        "win_rate",
        "profit_factor",
        "expectancy",
        "kelly",
        "max_drawdown",
    ];

    const ALL: [FitnessMetric; 11] = [
        Self::Sqn,
        Self::Sharpe,
        Self::Sortino,
        Self::Calmar,
        Self::ReturnPct,
        Self::EquityFinal,
        Self::WinRate,
        Self::ProfitFactor,
        Self::Expectancy,
        Self::Kelly,
        Self::MaxDrawdown,
    ];

    /// Extract the relevant value from a `Stats` table.
    pub fn extract(&self, stats: &Stats) -> f64 {
        match self {
            Self::Sqn => stats.sqn,
            Self::Sharpe => stats.sharpe,
            Self::Sortino => stats.sortino,
            Self::Calmar => stats.calmar,
            Self::ReturnPct => stats.return_pct,
            Self::EquityFinal => stats.equity_final,
            Self::WinRate => stats.win_rate_pct,
            Self::ProfitFactor => stats.profit_factor,
            Self::Expectancy => stats.expectancy_pct,
            Self::Kelly => stats.kelly_criterion,
            Self::MaxDrawdown => stats.max_drawdown_pct,
        }
    }

    pub fn name(&self) -> &'static str {
        let idx = Self::ALL.iter().position(|m| m == self).unwrap_or(0);
        Self::NAMES[idx]
    }
}

impl FromStr for FitnessMetric {
    type Err = UnknownMetric;

    /// Case-insensitive; also accepts the display labels of the stats table.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let metric = match key.as_str() {
            "sqn" => Self::Sqn,
            "sharpe" | "sharpe ratio" => Self::Sharpe,
            "sortino" | "sortino ratio" => Self::Sortino,
            "calmar" | "calmar ratio" => Self::Calmar,
            "return_pct" | "return [%]" => Self::ReturnPct,
            "equity_final" | "equity final [$]" => Self::EquityFinal,
            "win_rate" | "win rate [%]" => Self::WinRate,
            "profit_factor" | "profit factor" => Self::ProfitFactor,
            "expectancy" | "expectancy [%]" => Self::Expectancy,
            "kelly" | "kelly criterion" => Self::Kelly,
            "max_drawdown" | "max. drawdown [%]" => Self::MaxDrawdown,
            _ => return Err(UnknownMetric(s.to_string())),
        };
        Ok(metric)
    }
}

impl TryFrom<String> for FitnessMetric {
    type Error = UnknownMetric;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FitnessMetric> for String {
    fn from(m: FitnessMetric) -> Self {
        m.name().to_string()
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scoring function over a stats table.
pub type ScoreFn = dyn Fn(&Stats) -> f64 + Send + Sync;

/// What an optimization maximizes: a named metric or a custom score.
#[derive(Clone)]
pub enum Objective {
    Metric(FitnessMetric),
    Custom(Arc<ScoreFn>),
}

impl Objective {
    pub fn custom(f: impl Fn(&Stats) -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn score(&self, stats: &Stats) -> f64 {
        match self {
            Self::Metric(m) => m.extract(stats),
            Self::Custom(f) => f(stats),
        }
    }
}

impl Default for Objective {
    fn default() -> Self {
        Self::Metric(FitnessMetric::default())
    }
}

impl From<FitnessMetric> for Objective {
    fn from(m: FitnessMetric) -> Self {
        Self::Metric(m)
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric(m) => f.debug_tuple("Metric").field(m).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
