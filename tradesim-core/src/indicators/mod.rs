//! Indicators: precomputed numeric series derived from price data.
//!
//! Indicators are computed once in `Strategy::init` over the full history and
//! stored in an [`IndicatorSet`]. During the bar loop strategies only see an
//! [`IndicatorView`], which slices every series to the bars revealed so far.
//!
//! An indicator may have several dimensions (e.g. upper and lower bands); each
//! dimension must be as long as the price series.

pub mod atr;
pub mod ema;
pub mod sma;

pub use atr::Atr;
pub use ema::Ema;
pub use sma::Sma;

use thiserror::Error;

use crate::domain::SeriesView;

/// Error type user-supplied indicator closures may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Indicator computation errors, always naming the offending indicator.
#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("indicator '{name}' failed: {source}")]
    Compute {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("indicator '{name}' dimension {dimension} has {actual} values, expected {expected} (one per bar)")]
    LengthMismatch {
        name: String,
        dimension: usize,
        expected: usize,
        actual: usize,
    },

    #[error("indicator '{name}' produced no output")]
    NoDimensions { name: String },
}

/// Trait for bundled indicators.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Compute the indicator for the whole view, one value per bar.
    fn compute(&self, data: SeriesView<'_>) -> Vec<f64>;
}

/// Handle to a registered indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorId(usize);

/// One registered indicator: a name and one or more full-length dimensions.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    name: String,
    dimensions: Vec<Vec<f64>>,
}

impl IndicatorSeries {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> &[Vec<f64>] {
        &self.dimensions
    }
}

/// All indicators declared by a strategy, at full length.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    bars: usize,
    series: Vec<IndicatorSeries>,
}

impl IndicatorSet {
    pub fn new(bars: usize) -> Self {
        Self {
            bars,
            series: Vec::new(),
        }
    }

    /// Register a computed indicator after checking every dimension's length.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        dimensions: Vec<Vec<f64>>,
    ) -> Result<IndicatorId, IndicatorError> {
        let name = name.into();
        if dimensions.is_empty() {
            return Err(IndicatorError::NoDimensions { name });
        }
        if let Some((dimension, values)) = dimensions
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != self.bars)
        {
            return Err(IndicatorError::LengthMismatch {
                dimension,
                expected: self.bars,
                actual: values.len(),
                name,
            });
        }
        self.series.push(IndicatorSeries { name, dimensions });
        Ok(IndicatorId(self.series.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorSeries> {
        self.series.iter()
    }

    pub fn get(&self, id: IndicatorId) -> Option<&IndicatorSeries> {
        self.series.get(id.0)
    }

    /// Reveal only the first `len` values of every series.
    pub fn view(&self, len: usize) -> IndicatorView<'_> {
        IndicatorView {
            set: self,
            len: len.min(self.bars),
        }
    }
}

/// Indicator values revealed up to the current bar.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorView<'a> {
    set: &'a IndicatorSet,
    len: usize,
}

impl<'a> IndicatorView<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First dimension of an indicator, up to the current bar.
    pub fn values(&self, id: IndicatorId) -> Option<&'a [f64]> {
        self.dimension(id, 0)
    }

    /// A specific dimension of an indicator, up to the current bar.
    pub fn dimension(&self, id: IndicatorId, dimension: usize) -> Option<&'a [f64]> {
        let series = self.set.get(id)?;
        series.dimensions.get(dimension).map(|v| &v[..self.len])
    }

    /// Current value of an indicator's first dimension.
    pub fn last(&self, id: IndicatorId) -> Option<f64> {
        self.values(id)?.last().copied()
    }

    /// Value of the first dimension `bars_ago` bars before the current one.
    pub fn ago(&self, id: IndicatorId, bars_ago: usize) -> Option<f64> {
        let values = self.values(id)?;
        let idx = values.len().checked_sub(bars_ago + 1)?;
        Some(values[idx])
    }

    /// Look up an indicator by its registered name.
    pub fn by_name(&self, name: &str) -> Option<&'a [f64]> {
        let series = self.set.series.iter().find(|s| s.name == name)?;
        series.dimensions.first().map(|v| &v[..self.len])
    }
}

/// Create a synthetic price series from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> crate::domain::PriceSeries {
    use crate::domain::{Bar, PriceSeries};
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar::new(base + chrono::Duration::days(i as i64), open, high, low, close)
                .with_volume(1000.0)
        })
        .collect();
    PriceSeries::from_bars(bars).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_checks_length() {
        let mut set = IndicatorSet::new(3);
        let err = set
            .insert("bands", vec![vec![1.0, 2.0, 3.0], vec![1.0]])
            .unwrap_err();
        match err {
            IndicatorError::LengthMismatch {
                name,
                dimension,
                expected,
                actual,
            } => {
                assert_eq!(name, "bands");
                assert_eq!(dimension, 1);
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            set.insert("empty", vec![]),
            Err(IndicatorError::NoDimensions { .. })
        ));
    }

    #[test]
    fn view_truncates_every_dimension() {
        let mut set = IndicatorSet::new(4);
        let id = set
            .insert(
                "bands",
                vec![vec![1.0, 2.0, 3.0, 4.0], vec![10.0, 20.0, 30.0, 40.0]],
            )
            .unwrap();
        let view = set.view(2);
        assert_eq!(view.values(id), Some(&[1.0, 2.0][..]));
        assert_eq!(view.dimension(id, 1), Some(&[10.0, 20.0][..]));
        assert_eq!(view.last(id), Some(2.0));
        assert_eq!(view.ago(id, 1), Some(1.0));
        assert_eq!(view.ago(id, 2), None);
        assert_eq!(view.by_name("bands"), Some(&[1.0, 2.0][..]));
        assert_eq!(view.dimension(id, 2), None);
    }

    #[test]
    fn error_names_the_indicator() {
        let err = IndicatorError::Compute {
            name: "custom".into(),
            source: "division by zero".into(),
        };
        assert!(err.to_string().contains("custom"));
        assert!(err.to_string().contains("division by zero"));
    }
}
