//! TradeSim CLI: run and optimize backtests of the bundled strategies.
//!
//! Commands:
//! - `run`: one backtest from a CSV of bars and a TOML config
//! - `optimize`: parameter sweep from the config's `[optimize]` table

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tradesim_core::strategy::apply_overrides;
use tradesim_core::strategy::examples::{BuyAndHold, SmaCross};
use tradesim_core::{PriceSeries, Strategy};
use tradesim_runner::{
    load_csv, save_artifacts, save_heatmap, Backtest, BacktestResult, OptimizeSpec, RunConfig,
};

const STRATEGIES: &str = "sma_cross, buy_and_hold";

#[derive(Parser)]
#[command(
    name = "tradesim",
    about = "TradeSim CLI: event-driven single-instrument backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest and print its statistics.
    Run {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Sweep the parameters in the config's [optimize] table.
    Optimize {
        #[command(flatten)]
        inputs: Inputs,
    },
}

#[derive(clap::Args)]
struct Inputs {
    /// CSV file with timestamp, open, high, low, close and optional volume columns.
    #[arg(long)]
    data: PathBuf,

    /// TOML run configuration.
    #[arg(long)]
    config: PathBuf,

    /// Directory to write artifacts to. Nothing is written without it.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (inputs, optimize) = match cli.command {
        Commands::Run { inputs } => (inputs, false),
        Commands::Optimize { inputs } => (inputs, true),
    };

    let config = RunConfig::load(&inputs.config)?;
    let data = load_csv(&inputs.data)
        .with_context(|| format!("failed to load bars from {}", inputs.data.display()))?;
    let output = inputs.output.as_deref();

    match config.strategy.name.as_str() {
        "sma_cross" => dispatch::<SmaCross>(&data, &config, output, optimize),
        "buy_and_hold" => dispatch::<BuyAndHold>(&data, &config, output, optimize),
        other => bail!("unknown strategy '{other}'. Valid: {STRATEGIES}"),
    }
}

fn dispatch<S: Strategy>(
    data: &PriceSeries,
    config: &RunConfig,
    output: Option<&Path>,
    optimize: bool,
) -> Result<()> {
    let params = apply_overrides(&S::Params::default(), &config.strategy.params)?;
    let bt = Backtest::<S>::new(data, config.broker.clone())?.with_params(params);

    if !optimize {
        let result = bt.run()?;
        print_summary(&result);
        if let Some(dir) = output {
            save_artifacts(&result, dir)?;
            println!("Artifacts saved to: {}", dir.display());
        }
        return Ok(());
    }

    let Some(section) = &config.optimize else {
        bail!("config has no [optimize] table");
    };
    let mut spec = OptimizeSpec::from(section);
    spec.return_heatmap |= output.is_some();

    let opt = bt.optimize(&spec)?;
    println!();
    println!("=== Optimization ===");
    println!("Objective:      {}", section.maximize);
    println!("Evaluated:      {}", opt.evaluated);
    for (name, value) in &opt.best_params {
        println!("  {name:<14}{value}");
    }
    print_summary(&opt.best);

    if let Some(dir) = output {
        save_artifacts(&opt.best, dir)?;
        if let Some(heatmap) = &opt.heatmap {
            let path = save_heatmap(heatmap, dir)?;
            println!("Heatmap saved to: {}", path.display());
        }
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!("Run:            {}", &result.run_id[..result.run_id.len().min(12)]);
    println!("Warm-up bars:   {}", result.warmup_bars);
    println!();
    for (label, value) in result.stats.rows() {
        println!("{label:<32}{value:>16}");
    }
    if let Some(bar) = result.out_of_money {
        println!();
        println!("WARNING: account ran out of money on bar {bar}");
    }
    if !result.open_trades.is_empty() {
        println!("Open trades:    {}", result.open_trades.len());
    }
}
