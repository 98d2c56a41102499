//! Warm-up length from indicator NaN prefixes.

use crate::indicators::IndicatorSet;

/// Index of the first bar the strategy's `next()` is called on.
///
/// One past the largest index at which any dimension of any indicator first
/// becomes non-`NaN`; at least 1, so `next()` always sees a previous bar.
/// A dimension that is entirely `NaN` counts as valid from index 0.
pub fn compute_warmup(indicators: &IndicatorSet) -> usize {
    let last_first_valid = indicators
        .iter()
        .flat_map(|series| series.dimensions().iter())
        .map(|values| values.iter().position(|v| !v.is_nan()).unwrap_or(0))
        .max()
        .unwrap_or(0);
    1 + last_first_valid
}
