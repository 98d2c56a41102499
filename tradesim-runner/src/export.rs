//! Export: JSON and CSV artifacts for backtest and optimization results.
//!
//! - **JSON**: the full `BacktestResult` with schema versioning
//! - **CSV**: trades table, equity/drawdown curve, optimization heatmap
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::optimize::Heatmap;
use crate::result::{BacktestResult, EquityPoint, TradeRow, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("failed to flush CSV writer")]
    Flush,

    #[error("unsupported schema version {found} (max supported: {SCHEMA_VERSION})")]
    SchemaVersion { found: u32 },
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn result_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult`, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::SchemaVersion {
            found: result.schema_version,
        });
    }
    Ok(result)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|_| ExportError::Flush)?;
    Ok(String::from_utf8(data)?)
}

/// Trades table, one row per trade.
pub fn trades_csv(trades: &[TradeRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "size",
        "entry_bar",
        "exit_bar",
        "entry_time",
        "exit_time",
        "entry_price",
        "exit_price",
        "pnl",
        "return_pct",
        "commission",
        "duration_bars",
        "sl",
        "tp",
        "tag",
    ])?;

    for t in trades {
        wtr.write_record([
            t.size.to_string(),
            t.entry_bar.to_string(),
            opt(t.exit_bar),
            opt(t.entry_time),
            opt(t.exit_time),
            format!("{:.6}", t.entry_price),
            opt(t.exit_price.map(|p| format!("{p:.6}"))),
            format!("{:.2}", t.pnl),
            format!("{:.4}", t.return_pct),
            format!("{:.2}", t.commission),
            t.duration_bars.to_string(),
            opt(t.sl),
            opt(t.tp),
            t.tag.clone().unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Equity curve with drawdown per bar.
pub fn equity_csv(points: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar", "timestamp", "equity", "drawdown_pct"])?;
    for p in points {
        wtr.write_record([
            p.bar.to_string(),
            p.timestamp.to_string(),
            format!("{:.2}", p.equity),
            format!("{:.4}", p.drawdown_pct),
        ])?;
    }
    finish(wtr)
}

fn cell(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One column per parameter plus `score`; runs without trades have an empty score.
pub fn heatmap_csv(heatmap: &Heatmap) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = heatmap.param_names.clone();
    header.push("score".into());
    wtr.write_record(&header)?;

    for row in &heatmap.rows {
        let mut record: Vec<String> = heatmap
            .param_names
            .iter()
            .map(|name| row.params.get(name).map(cell).unwrap_or_default())
            .collect();
        record.push(if row.score.is_nan() {
            String::new()
        } else {
            row.score.to_string()
        });
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write(path: PathBuf, contents: &str) -> Result<(), ExportError> {
    std::fs::write(&path, contents).map_err(|source| ExportError::Io { path, source })
}

/// Save `result.json`, `trades.csv` and `equity.csv` under `dir`, creating it
/// if needed. Open trades are appended to the trades table.
pub fn save_artifacts(result: &BacktestResult, dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut trades = result.trades.clone();
    trades.extend(result.open_trades.iter().cloned());

    write(dir.join("result.json"), &result_json(result)?)?;
    write(dir.join("trades.csv"), &trades_csv(&trades)?)?;
    write(dir.join("equity.csv"), &equity_csv(&result.equity_curve)?)?;

    info!(dir = %dir.display(), trades = trades.len(), "artifacts saved");
    Ok(())
}

pub fn save_heatmap(heatmap: &Heatmap, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join("heatmap.csv");
    write(path.clone(), &heatmap_csv(heatmap)?)?;
    Ok(path)
}

/// Load a `BacktestResult` from a directory written by [`save_artifacts`].
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ExportError> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path).map_err(|source| ExportError::Io { path, source })?;
    import_json(&json)
}
