//! PriceSeries: columnar OHLCV storage with progressive reveal.
//!
//! The series itself always holds the full history. The engine hands
//! strategies a [`SeriesView`] whose length grows by one bar per iteration,
//! so nothing after the current bar is reachable from strategy code.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use super::bar::Bar;

/// Errors raised while building a price series from raw bars.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("price series is empty")]
    Empty,

    #[error("bar {index} ({timestamp}) has missing OHLC values")]
    MissingValues {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("bar {index} repeats timestamp {timestamp} of the bar before it")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

/// Immutable, validated OHLCV history stored column by column.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    timestamps: Vec<NaiveDateTime>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from bars.
    ///
    /// Rejects empty input, bars with missing OHLC values and repeated
    /// timestamps. Bars that are not in ascending timestamp order are stably
    /// sorted with a warning.
    pub fn from_bars(mut bars: Vec<Bar>) -> Result<Self, DataError> {
        if bars.is_empty() {
            return Err(DataError::Empty);
        }

        if let Some((index, bar)) = bars
            .iter()
            .enumerate()
            .find(|(_, bar)| bar.has_missing_prices())
        {
            return Err(DataError::MissingValues {
                index,
                timestamp: bar.timestamp,
            });
        }

        if !bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
            warn!(
                bars = bars.len(),
                "bar timestamps are not in ascending order, sorting"
            );
            bars.sort_by_key(|bar| bar.timestamp);
        }

        if let Some(pos) = bars.windows(2).position(|w| w[0].timestamp == w[1].timestamp) {
            return Err(DataError::DuplicateTimestamp {
                index: pos + 1,
                timestamp: bars[pos].timestamp,
            });
        }

        let n = bars.len();
        let mut series = Self {
            timestamps: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        };
        for bar in bars {
            series.timestamps.push(bar.timestamp);
            series.open.push(bar.open);
            series.high.push(bar.high);
            series.low.push(bar.low);
            series.close.push(bar.close);
            series.volume.push(bar.volume.unwrap_or(f64::NAN));
        }
        Ok(series)
    }

    /// Number of bars in the full history.
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// A view revealing only the first `len` bars (clamped to the full length).
    pub fn view(&self, len: usize) -> SeriesView<'_> {
        SeriesView {
            series: self,
            len: len.min(self.len()),
        }
    }

    /// A view over the whole history.
    pub fn full(&self) -> SeriesView<'_> {
        self.view(self.len())
    }

    pub fn bar(&self, index: usize) -> Option<Bar> {
        if index >= self.len() {
            return None;
        }
        let volume = self.volume[index];
        Some(Bar {
            timestamp: self.timestamps[index],
            open: self.open[index],
            high: self.high[index],
            low: self.low[index],
            close: self.close[index],
            volume: (!volume.is_nan()).then_some(volume),
        })
    }
}

/// A prefix of a [`PriceSeries`]: bars `0..len` are visible.
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    series: &'a PriceSeries,
    len: usize,
}

impl<'a> SeriesView<'a> {
    /// Visible length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the most recent visible bar.
    pub fn current_index(&self) -> Option<usize> {
        self.len.checked_sub(1)
    }

    pub fn timestamps(&self) -> &'a [NaiveDateTime] {
        &self.series.timestamps[..self.len]
    }

    pub fn open(&self) -> &'a [f64] {
        &self.series.open[..self.len]
    }

    pub fn high(&self) -> &'a [f64] {
        &self.series.high[..self.len]
    }

    pub fn low(&self) -> &'a [f64] {
        &self.series.low[..self.len]
    }

    pub fn close(&self) -> &'a [f64] {
        &self.series.close[..self.len]
    }

    pub fn volume(&self) -> &'a [f64] {
        &self.series.volume[..self.len]
    }

    /// Close of the most recent visible bar.
    pub fn last_close(&self) -> Option<f64> {
        self.close().last().copied()
    }

    pub fn bar(&self, index: usize) -> Option<Bar> {
        if index >= self.len {
            return None;
        }
        self.series.bar(index)
    }
}
