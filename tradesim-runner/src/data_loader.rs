//! CSV bar loading.
//!
//! Expects a header row with `open`, `high`, `low`, `close` columns, a
//! timestamp column named `timestamp`, `date`, `datetime` or `time`, and an
//! optional `volume` column. Header names are matched case-insensitively.
//!
//! An empty OHLC cell becomes `NaN`, which the price series rejects as a
//! missing value. An empty volume cell is treated as absent.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;
use tradesim_core::{Bar, DataError, PriceSeries};

const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "date", "datetime", "time"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: unrecognized timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: invalid {column} value '{value}'")]
    Value {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Column positions resolved from the header row.
struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| find(*name))
            .ok_or(LoadError::MissingColumn("timestamp"))?;

        Ok(Self {
            timestamp,
            open: find("open").ok_or(LoadError::MissingColumn("open"))?,
            high: find("high").ok_or(LoadError::MissingColumn("high"))?,
            low: find("low").ok_or(LoadError::MissingColumn("low"))?,
            close: find("close").ok_or(LoadError::MissingColumn("close"))?,
            volume: find("volume"),
        })
    }
}

/// Load a price series from a CSV file.
pub fn load_csv(path: &Path) -> Result<PriceSeries, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let series = parse_csv(file)?;
    debug!(path = %path.display(), bars = series.len(), "loaded bars");
    Ok(series)
}

/// Parse a price series from any CSV reader.
pub fn parse_csv<R: Read>(reader: R) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = Columns::resolve(rdr.headers()?)?;

    let mut bars = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // 1-based data row, matching what a spreadsheet shows below the header.
        let row = i + 1;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let timestamp = parse_timestamp(field(columns.timestamp)).ok_or_else(|| {
            LoadError::Timestamp {
                row,
                value: field(columns.timestamp).to_string(),
            }
        })?;
        let price = |idx: usize, column: &'static str| parse_price(field(idx), row, column);

        let mut bar = Bar::new(
            timestamp,
            price(columns.open, "open")?,
            price(columns.high, "high")?,
            price(columns.low, "low")?,
            price(columns.close, "close")?,
        );
        if let Some(idx) = columns.volume {
            let raw = field(idx);
            if !raw.is_empty() {
                bar = bar.with_volume(parse_price(raw, row, "volume")?);
            }
        }
        bars.push(bar);
    }

    Ok(PriceSeries::from_bars(bars)?)
}

fn parse_price(raw: &str, row: usize, column: &'static str) -> Result<f64, LoadError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| LoadError::Value {
        row,
        column,
        value: raw.to_string(),
    })
}

/// Accepts RFC 3339, common date-time layouts, a bare date, or epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}
