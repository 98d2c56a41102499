//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! Lookback: period (TR[0] has no previous close and is excluded).

use super::Indicator;
use crate::domain::SeriesView;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    /// A period of zero is treated as one.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series. TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    (0..n)
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                return range;
            }
            let pc = close[i - 1];
            range.max((high[i] - pc).abs()).max((low[i] - pc).abs())
        })
        .collect()
}

/// Wilder smoothing: seed with the mean of the first `period` values starting
/// at `start`, then `alpha = 1/period`.
pub fn wilder_smooth(values: &[f64], start: usize, period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let seed_end = start + period;
    if period == 0 || seed_end > n {
        return result;
    }

    let seed = values[start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, data: SeriesView<'_>) -> Vec<f64> {
        let tr = true_range(data.high(), data.low(), data.close());
        wilder_smooth(&tr, 1, self.period)
    }
}
