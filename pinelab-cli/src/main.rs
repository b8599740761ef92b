//! Pinelab CLI — compile strategies, run backtests, sweep parameters.
//!
//! Commands:
//! - `compile` — compile a script and print its schema, settings and warmup
//! - `run` — execute a backtest from a TOML config, write the JSON report
//! - `sweep` — grid-sweep one integer input over a range

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use pinelab_core::data::{synthetic_1m, BarSource, CsvSource, InMemorySource, ParquetCache};
use pinelab_core::engine::{CancelToken, ProgressSink};
use pinelab_core::pine::{compile, ParamValue};
use pinelab_runner::{run_sweep, DataConfig, RunConfig, RunError, SweepAxis};

#[derive(Parser)]
#[command(name = "pinelab", about = "Strategy-script backtesting", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a strategy script and print its interface as JSON.
    Compile {
        /// Path to the strategy script.
        script: PathBuf,
    },
    /// Run a backtest described by a TOML config file.
    Run {
        /// Path to the run configuration.
        config: PathBuf,
        /// Where to write the JSON report (stdout when omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Suppress progress output.
        #[arg(short, long)]
        quiet: bool,
    },
    /// Sweep one integer input across a range, printing a summary table.
    Sweep {
        /// Path to the run configuration.
        config: PathBuf,
        /// Input name to sweep.
        #[arg(long)]
        param: String,
        /// Inclusive range start.
        #[arg(long)]
        from: i64,
        /// Inclusive range end.
        #[arg(long)]
        to: i64,
        /// Step between grid points.
        #[arg(long, default_value_t = 1)]
        step: i64,
    },
}

/// Prints engine progress lines to stderr.
struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn report(&self, pct: u8, message: &str) {
        eprintln!("[{pct:>3}%] {message}");
    }
}

struct QuietProgress;

impl ProgressSink for QuietProgress {
    fn report(&self, _pct: u8, _message: &str) {}
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Compile { script } => cmd_compile(&script),
        Command::Run { config, out, quiet } => cmd_run(&config, out.as_deref(), quiet),
        Command::Sweep {
            config,
            param,
            from,
            to,
            step,
        } => cmd_sweep(&config, &param, from, to, step),
    }
}

fn cmd_compile(script: &std::path::Path) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("reading {}", script.display()))?;
    let strategy = compile(&source)?;

    let summary = serde_json::json!({
        "name": strategy.name,
        "warmup": strategy.warmup,
        "settings": strategy.settings,
        "inputs": strategy.input_schema,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_run(config_path: &std::path::Path, out: Option<&std::path::Path>, quiet: bool) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    let source_text = std::fs::read_to_string(&config.script)
        .with_context(|| format!("reading {}", config.script.display()))?;
    let strategy = compile(&source_text)?;

    let source = build_source(&config.data)?;
    let options = config.to_options();
    let cancel = CancelToken::new();

    let report = if quiet {
        pinelab_runner::run_backtest(source.as_ref(), &strategy, &options, &QuietProgress, &cancel)
    } else {
        pinelab_runner::run_backtest(source.as_ref(), &strategy, &options, &StderrProgress, &cancel)
    };
    let report = match report {
        Ok(report) => report,
        Err(RunError::Cancelled) => bail!("run cancelled"),
        Err(err) => return Err(err.into()),
    };

    let json = serde_json::to_string_pretty(&report)?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "report written to {} (run id {})",
                    path.display(),
                    config.run_id()
                );
            }
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_sweep(
    config_path: &std::path::Path,
    param: &str,
    from: i64,
    to: i64,
    step: i64,
) -> Result<()> {
    if step <= 0 || to < from {
        bail!("sweep range must be ascending with a positive step");
    }

    let config = RunConfig::load(config_path)?;
    let source_text = std::fs::read_to_string(&config.script)
        .with_context(|| format!("reading {}", config.script.display()))?;
    let strategy = compile(&source_text)?;
    if !strategy.input_schema.contains_key(param) {
        bail!("strategy has no input named '{param}'");
    }

    let source = build_source(&config.data)?;
    let options = config.to_options();
    let df_1m = source.load_1m(
        &options.symbol,
        &options.exchange,
        options.start,
        options.end,
    )?;

    let values: Vec<ParamValue> = (from..=to).step_by(step as usize).map(ParamValue::Int).collect();
    let axes = vec![SweepAxis {
        name: param.to_string(),
        values,
    }];

    let cancel = CancelToken::new();
    let rows = match run_sweep(&df_1m, &strategy, &options, &axes, &cancel) {
        Ok(rows) => rows,
        Err(RunError::Cancelled) => bail!("sweep cancelled"),
        Err(err) => return Err(err.into()),
    };

    println!("{:>10}  {:>12}  {:>8}  {:>10}  {:>7}", param, "return %", "sharpe", "max dd %", "trades");
    for row in rows {
        if let Some(err) = &row.error {
            println!("{:>10?}  failed: {err}", row.params.get(param));
            continue;
        }
        let sharpe = row
            .sharpe_ratio
            .map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
        let value = match row.params.get(param) {
            Some(ParamValue::Int(v)) => v.to_string(),
            other => format!("{other:?}"),
        };
        println!(
            "{:>10}  {:>12.2}  {:>8}  {:>10.2}  {:>7}",
            value, row.total_return_pct, sharpe, row.max_drawdown_pct, row.total_trades
        );
    }
    Ok(())
}

fn build_source(data: &DataConfig) -> Result<Box<dyn BarSource>> {
    use chrono::TimeZone;
    Ok(match data {
        DataConfig::Csv { path } => Box::new(CsvSource::new(path)),
        DataConfig::Parquet { dir } => Box::new(ParquetCache::new(dir)),
        DataConfig::Synthetic { bars, seed } => {
            // Start on a day boundary so every timeframe buckets cleanly
            let now = Utc::now().timestamp();
            let aligned = now - now.rem_euclid(86_400);
            let start = Utc
                .timestamp_opt(aligned - *bars as i64 * 60, 0)
                .single()
                .context("synthetic start timestamp out of range")?;
            Box::new(InMemorySource::new(synthetic_1m(*bars, *seed, start)))
        }
    })
}
