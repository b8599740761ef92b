//! Backtest runner — wires together the engine, the portfolio simulator
//! and result assembly.
//!
//! Two entry points:
//! - `run_backtest()`: loads bars from the source, then runs. Used by the CLI.
//! - `run_backtest_on_frames()`: takes pre-loaded 1m bars. Used by sweeps.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use pinelab_core::data::{resample, BarSource};
use pinelab_core::domain::{OhlcvFrame, Timeframe};
use pinelab_core::engine::{
    run_on_frames, Backtester, CancelToken, EngineError, EngineRequest, MagnifierBackend,
    ProgressSink,
};
use pinelab_core::pine::{CompiledStrategy, ParamValue};

use crate::portfolio::{simulate, OrderSizing, PortfolioSpec};
use crate::report::{assemble_report, BacktestReport};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Engine(EngineError),
    /// Cooperative cancellation; callers treat this as a non-error outcome.
    #[error("run cancelled")]
    Cancelled,
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        if err.is_cancelled() {
            RunError::Cancelled
        } else {
            RunError::Engine(err)
        }
    }
}

/// Everything configurable about a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub symbol: String,
    pub exchange: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub timeframe: Timeframe,
    pub magnify: bool,
    pub backend: MagnifierBackend,
    /// Overrides for the strategy-declared settings.
    pub initial_capital: Option<f64>,
    pub fees: Option<f64>,
    pub slippage: Option<f64>,
    pub sizing: OrderSizing,
    pub overrides: HashMap<String, ParamValue>,
}

impl RunOptions {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: "NYSE".to_string(),
            start: None,
            end: None,
            timeframe,
            magnify: true,
            backend: MagnifierBackend::default(),
            initial_capital: None,
            fees: None,
            slippage: None,
            sizing: OrderSizing::default(),
            overrides: HashMap::new(),
        }
    }

    fn engine_request(&self) -> EngineRequest {
        EngineRequest {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            start: self.start,
            end: self.end,
            timeframe: self.timeframe,
            magnify: self.magnify,
            backend: self.backend,
            overrides: self.overrides.clone(),
        }
    }

    fn portfolio_spec(&self, strategy: &CompiledStrategy) -> PortfolioSpec {
        PortfolioSpec {
            initial_capital: self
                .initial_capital
                .unwrap_or_else(|| strategy.settings.capital()),
            fees: self.fees.unwrap_or_else(|| strategy.settings.commission()),
            slippage: self
                .slippage
                .unwrap_or_else(|| strategy.settings.slippage_frac()),
            sizing: self.sizing,
        }
    }
}

/// Run a backtest end to end: load, resample, evaluate, simulate, report.
pub fn run_backtest(
    source: &dyn BarSource,
    strategy: &CompiledStrategy,
    options: &RunOptions,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<BacktestReport, RunError> {
    let backtester = Backtester::new(source);
    let engine_output = backtester.run(strategy, &options.engine_request(), progress, cancel)?;
    finish(strategy, options, engine_output, progress, cancel)
}

/// Run against pre-loaded 1m bars; no data-source I/O.
pub fn run_backtest_on_frames(
    df_1m: &OhlcvFrame,
    strategy: &CompiledStrategy,
    options: &RunOptions,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<BacktestReport, RunError> {
    let df_tf = resample(df_1m, options.timeframe);
    let engine_output = run_on_frames(
        strategy,
        df_1m,
        df_tf,
        &options.engine_request(),
        progress,
        cancel,
    )?;
    finish(strategy, options, engine_output, progress, cancel)
}

fn finish(
    strategy: &CompiledStrategy,
    options: &RunOptions,
    engine_output: pinelab_core::engine::EngineOutput,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<BacktestReport, RunError> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    let spec = options.portfolio_spec(strategy);

    progress.report(90, "building portfolio");
    let portfolio = simulate(
        &engine_output.signal_timestamps,
        &engine_output.signal_close,
        &engine_output.signals,
        &spec,
    );

    progress.report(95, "extracting results");
    let report = assemble_report(
        strategy,
        &options.symbol,
        &options.exchange,
        options.timeframe,
        spec.initial_capital,
        &engine_output,
        portfolio,
    );

    progress.report(100, "done");
    Ok(report)
}
