//! Parameter optimization: grid and randomized search over strategy params.
//!
//! Every admissible combination is an isolated backtest. Runs share only the
//! read-only price series and are evaluated in parallel with rayon; the
//! scores are joined into a heatmap once every run has finished.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use tradesim_core::{ParamSet, Strategy};

use crate::backtest::{Backtest, RunError};
use crate::config::OptimizeSection;
use crate::fitness::Objective;
use crate::result::BacktestResult;

/// Sweeps above this many runs log a cost warning.
pub const LARGE_SWEEP: usize = 300;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("no parameters to optimize")]
    EmptyGrid,

    #[error("optimization parameter '{0}' has no values")]
    EmptyValues(String),

    #[error("constraint rejected all {0} parameter combinations")]
    NoAdmissible(usize),

    #[error("max_tries must be a count >= 1 or a fraction in (0, 1], got {0}")]
    InvalidMaxTries(String),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Admissibility predicate over a parameter combination.
pub type Constraint = dyn Fn(&ParamSet) -> bool + Send + Sync;

/// Named candidate value lists. Combinations are enumerated in sorted name
/// order, the last name varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<Value>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.params.insert(name.into(), values);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of combinations before any constraint.
    pub fn size(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    pub fn validate(&self) -> Result<(), OptimizeError> {
        if self.params.is_empty() {
            return Err(OptimizeError::EmptyGrid);
        }
        match self.params.iter().find(|(_, values)| values.is_empty()) {
            Some((name, _)) => Err(OptimizeError::EmptyValues(name.clone())),
            None => Ok(()),
        }
    }

    /// Cartesian product of every value list.
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut combos = vec![ParamSet::new()];
        for (name, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|base| {
                    values.iter().map(move |v| {
                        let mut combo = base.clone();
                        combo.insert(name.clone(), v.clone());
                        combo
                    })
                })
                .collect();
        }
        if self.params.is_empty() {
            combos.clear();
        }
        combos
    }
}

impl From<BTreeMap<String, Vec<Value>>> for ParamGrid {
    fn from(params: BTreeMap<String, Vec<Value>>) -> Self {
        Self { params }
    }
}

/// Cap on the number of combinations evaluated.
///
/// A `Count` runs at most that many; a `Fraction` runs that share of the
/// admissible grid, at least one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxTries {
    Count(usize),
    Fraction(f64),
}

impl MaxTries {
    pub fn validate(&self) -> Result<(), OptimizeError> {
        match *self {
            MaxTries::Count(0) => Err(OptimizeError::InvalidMaxTries("0".into())),
            MaxTries::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(OptimizeError::InvalidMaxTries(f.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Number of runs out of `admissible` combinations.
    pub fn resolve(&self, admissible: usize) -> usize {
        let n = match *self {
            MaxTries::Count(n) => n,
            MaxTries::Fraction(f) => ((f * admissible as f64).floor() as usize).max(1),
        };
        n.min(admissible)
    }
}

/// What to sweep and how to rank the results.
#[derive(Clone, Default)]
pub struct OptimizeSpec {
    pub grid: ParamGrid,
    pub objective: Objective,
    pub constraint: Option<Arc<Constraint>>,
    pub max_tries: Option<MaxTries>,
    pub random_seed: Option<u64>,
    pub return_heatmap: bool,
}

impl OptimizeSpec {
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    pub fn maximize(mut self, objective: impl Into<Objective>) -> Self {
        self.objective = objective.into();
        self
    }

    pub fn constraint(mut self, f: impl Fn(&ParamSet) -> bool + Send + Sync + 'static) -> Self {
        self.constraint = Some(Arc::new(f));
        self
    }

    pub fn max_tries(mut self, tries: MaxTries) -> Self {
        self.max_tries = Some(tries);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn return_heatmap(mut self, enabled: bool) -> Self {
        self.return_heatmap = enabled;
        self
    }

    fn is_admissible(&self, combo: &ParamSet) -> bool {
        self.constraint.as_ref().map_or(true, |f| f(combo))
    }
}

impl std::fmt::Debug for OptimizeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizeSpec")
            .field("grid", &self.grid)
            .field("objective", &self.objective)
            .field("constraint", &self.constraint.as_ref().map(|_| ".."))
            .field("max_tries", &self.max_tries)
            .field("random_seed", &self.random_seed)
            .field("return_heatmap", &self.return_heatmap)
            .finish()
    }
}

impl From<&OptimizeSection> for OptimizeSpec {
    fn from(section: &OptimizeSection) -> Self {
        Self {
            grid: ParamGrid::from(section.params.clone()),
            objective: Objective::Metric(section.maximize),
            constraint: None,
            max_tries: section.max_tries,
            random_seed: section.random_seed,
            return_heatmap: section.return_heatmap,
        }
    }
}

/// One evaluated combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub params: ParamSet,
    /// `NaN` when the run made no trades.
    pub score: f64,
}

/// Score of every evaluated combination, in grid order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub param_names: Vec<String>,
    pub rows: Vec<HeatmapRow>,
}

impl Heatmap {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest non-NaN score; the first one wins ties.
    pub fn best(&self) -> Option<&HeatmapRow> {
        self.rows
            .iter()
            .filter(|row| !row.score.is_nan())
            .fold(None, |best: Option<&HeatmapRow>, row| match best {
                Some(b) if b.score >= row.score => Some(b),
                _ => Some(row),
            })
    }
}

/// Outcome of an optimization sweep.
#[derive(Debug, Clone)]
pub struct Optimization {
    /// Full result of the best combination.
    pub best: BacktestResult,
    pub best_params: ParamSet,
    /// Present when requested.
    pub heatmap: Option<Heatmap>,
    /// Number of backtests run during the sweep.
    pub evaluated: usize,
}

/// Read-only state handed to every sweep worker.
struct SweepContext<'s, 'a, S: Strategy> {
    backtest: &'s Backtest<'a, S>,
    objective: &'s Objective,
}

impl<S: Strategy> SweepContext<'_, '_, S> {
    fn evaluate(&self, combo: &ParamSet) -> Result<f64, RunError> {
        let result = self.backtest.run_with(combo)?;
        if result.stats.trades == 0 {
            return Ok(f64::NAN);
        }
        Ok(self.objective.score(&result.stats))
    }
}

/// Admissible combinations, randomly thinned when `max_tries` is set.
/// Sampling keeps grid order so the heatmap reads the same either way.
pub fn select_combinations(spec: &OptimizeSpec) -> Result<Vec<ParamSet>, OptimizeError> {
    spec.grid.validate()?;
    if let Some(tries) = &spec.max_tries {
        tries.validate()?;
    }

    let all = spec.grid.combinations();
    let total = all.len();
    let admissible: Vec<ParamSet> = all.into_iter().filter(|c| spec.is_admissible(c)).collect();
    if admissible.is_empty() {
        return Err(OptimizeError::NoAdmissible(total));
    }

    let Some(tries) = spec.max_tries else {
        return Ok(admissible);
    };
    let amount = tries.resolve(admissible.len());
    if amount == admissible.len() {
        return Ok(admissible);
    }

    let mut rng = match spec.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut picks = rand::seq::index::sample(&mut rng, admissible.len(), amount).into_vec();
    picks.sort_unstable();

    let mut slots: Vec<Option<ParamSet>> = admissible.into_iter().map(Some).collect();
    Ok(picks.into_iter().filter_map(|i| slots[i].take()).collect())
}

impl<'a, S: Strategy> Backtest<'a, S> {
    /// Run every selected combination and return the best by `spec.objective`.
    ///
    /// Runs that make no trades score `NaN` and never win. If no run scores,
    /// the first combination is reported so a result still exists.
    pub fn optimize(&self, spec: &OptimizeSpec) -> Result<Optimization, OptimizeError> {
        let combos = select_combinations(spec)?;
        if combos.len() > LARGE_SWEEP {
            warn!(
                combinations = combos.len(),
                "large optimization sweep; consider max_tries or a constraint"
            );
        }
        info!(
            combinations = combos.len(),
            grid = spec.grid.size(),
            objective = ?spec.objective,
            "optimization started"
        );

        let ctx = SweepContext {
            backtest: self,
            objective: &spec.objective,
        };
        let scores = combos
            .par_iter()
            .map(|combo| ctx.evaluate(combo))
            .collect::<Result<Vec<f64>, RunError>>()?;

        let heatmap = Heatmap {
            param_names: spec.grid.names().map(str::to_owned).collect(),
            rows: combos
                .into_iter()
                .zip(scores)
                .map(|(params, score)| HeatmapRow { params, score })
                .collect(),
        };
        let evaluated = heatmap.len();

        let best_params = match heatmap.best() {
            Some(row) => {
                debug!(score = row.score, params = ?row.params, "best combination");
                row.params.clone()
            }
            None => {
                warn!(
                    combinations = evaluated,
                    "no combination produced any trades; reporting the first one"
                );
                heatmap.rows[0].params.clone()
            }
        };

        let best = self.run_with(&best_params)?;
        Ok(Optimization {
            best,
            best_params,
            heatmap: spec.return_heatmap.then_some(heatmap),
            evaluated,
        })
    }
}
