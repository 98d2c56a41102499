//! End-to-end: CSV bars and a TOML config on disk, through to a result.

mod common;

use std::io::Write;

use common::{to_csv, wave};
use tradesim_core::strategy::apply_overrides;
use tradesim_core::strategy::examples::{SmaCross, SmaCrossParams};
use tradesim_core::CommissionModel;
use tradesim_runner::{load_csv, Backtest, ConfigError, LoadError, OptimizeSpec, RunConfig};

const CONFIG: &str = r#"
[broker]
cash = 25000.0
commission = { type = "BASIS", offset = 0.01 }
hedging = false

[strategy]
name = "sma_cross"
params = { fast = 6, slow = 18, tp_pct = 0.08 }

[optimize]
maximize = "return_pct"
params = { fast = [4, 6], slow = [18, 24] }
"#;

fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn csv_and_toml_drive_a_backtest() {
    let dir = tempfile::tempdir().unwrap();
    let source = wave(180);
    let csv_path = write_file(dir.path(), "bars.csv", &to_csv(&source));
    let toml_path = write_file(dir.path(), "run.toml", CONFIG);

    let data = load_csv(&csv_path).unwrap();
    assert_eq!(data.len(), 180);
    assert_eq!(data.full().close(), source.full().close());

    let config = RunConfig::load(&toml_path).unwrap();
    assert_eq!(config.broker.commission, CommissionModel::Basis { offset: 0.01 });

    let params = apply_overrides(&SmaCrossParams::default(), &config.strategy.params).unwrap();
    assert_eq!(params.fast, 6);
    assert_eq!(params.tp_pct, Some(0.08));

    let bt = Backtest::<SmaCross>::new(&data, config.broker.clone())
        .unwrap()
        .with_params(params);
    let result = bt.run().unwrap();
    assert_eq!(result.warmup_bars, 18);
    assert!(result.stats.trades > 0);
    assert!(result.trades.iter().all(|t| t.commission > 0.0));

    let opt = bt
        .optimize(&OptimizeSpec::from(config.optimize.as_ref().unwrap()))
        .unwrap();
    assert_eq!(opt.evaluated, 4);
    // Grid values override the base parameters; the rest are kept.
    assert_eq!(opt.best.params["tp_pct"], serde_json::json!(0.08));
}

#[test]
fn loaded_data_hashes_like_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = wave(40);
    let csv_path = write_file(dir.path(), "bars.csv", &to_csv(&source));
    let data = load_csv(&csv_path).unwrap();

    let a = Backtest::<SmaCross>::new(&data, Default::default()).unwrap();
    let b = Backtest::<SmaCross>::new(&source, Default::default()).unwrap();
    assert_eq!(a.dataset_hash(), b.dataset_hash());
}

#[test]
fn unsorted_csv_is_sorted() {
    let csv = "date,open,high,low,close\n\
               2024-01-03,11,12,10,11\n\
               2024-01-02,10,11,9,10\n\
               2024-01-04,12,13,11,12\n";
    let data = tradesim_runner::parse_csv(csv.as_bytes()).unwrap();
    assert_eq!(data.full().close(), &[10.0, 11.0, 12.0]);
}

#[test]
fn missing_files_are_reported_with_their_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    match load_csv(&missing) {
        Err(LoadError::Io { path, .. }) => assert!(path.ends_with("nope.csv")),
        other => panic!("expected an I/O error, got {other:?}"),
    }
    assert!(matches!(
        RunConfig::load(&dir.path().join("nope.toml")),
        Err(ConfigError::Read { .. })
    ));
}
