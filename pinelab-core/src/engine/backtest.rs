//! Backtest engine entry point: loads bars, resamples, dispatches the
//! standard or magnifier path, and hands back signal vectors paired with
//! the series they reference.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{resample, BarSource};
use crate::domain::{OhlcvFrame, Timeframe};
use crate::pine::eval::TableView;
use crate::pine::{CompiledStrategy, ParamValue, SignalVectors};

use super::magnifier::{run_magnifier, MagnifierBackend, DEFAULT_TARGET_TICKS};
use super::params::resolve_params;
use super::progress::{CancelToken, ProgressSink};
use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Standard,
    Magnifier,
}

/// What to run a compiled strategy against.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub symbol: String,
    pub exchange: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub timeframe: Timeframe,
    /// Magnifier mode; falls back to standard on a 1m chart.
    pub magnify: bool,
    pub backend: MagnifierBackend,
    pub overrides: HashMap<String, ParamValue>,
}

impl EngineRequest {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: "NYSE".to_string(),
            start: None,
            end: None,
            timeframe,
            magnify: true,
            backend: MagnifierBackend::default(),
            overrides: HashMap::new(),
        }
    }
}

/// Signals plus the series they index, ready for the portfolio simulator.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub mode: RunMode,
    /// The chart-timeframe frame (candles, markers, reporting).
    pub chart: OhlcvFrame,
    /// Timeframe of the signal timeline: the chart TF in standard mode,
    /// the magnifier resolution in magnifier mode.
    pub signal_timeframe: Timeframe,
    pub signal_timestamps: Vec<DateTime<Utc>>,
    pub signal_close: Vec<f64>,
    pub signals: SignalVectors,
    /// Fully resolved parameters the signals were computed with.
    pub params: HashMap<String, ParamValue>,
}

/// Runs compiled strategies against a bar source.
///
/// Holds only a shared reference to the read-only source; every run owns
/// its frames and buffers, so one backtester may serve concurrent callers.
pub struct Backtester<'a> {
    source: &'a dyn BarSource,
}

impl<'a> Backtester<'a> {
    pub fn new(source: &'a dyn BarSource) -> Self {
        Self { source }
    }

    /// Load, resample and evaluate. Progress covers [10, 88]; the caller
    /// owns portfolio construction and result assembly above that.
    pub fn run(
        &self,
        strategy: &CompiledStrategy,
        request: &EngineRequest,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<EngineOutput, EngineError> {
        progress.report(10, "loading 1m bars");
        let df_1m = self.source.load_1m(
            &request.symbol,
            &request.exchange,
            request.start,
            request.end,
        )?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        progress.report(15, &format!("resampling to {}", request.timeframe));
        let df_tf = resample(&df_1m, request.timeframe);

        run_on_frames(strategy, &df_1m, df_tf, request, progress, cancel)
    }
}

/// Evaluate against pre-loaded 1m bars. Used by the backtester and by
/// parameter sweeps that reuse one loaded dataset across many runs.
pub fn run_on_frames(
    strategy: &CompiledStrategy,
    df_1m: &OhlcvFrame,
    df_tf: OhlcvFrame,
    request: &EngineRequest,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<EngineOutput, EngineError> {
    let params = resolve_params(&strategy.input_schema, &request.overrides)?;

    let mode = if request.magnify && request.timeframe != Timeframe::M1 {
        RunMode::Magnifier
    } else {
        RunMode::Standard
    };

    match mode {
        RunMode::Standard => {
            progress.report(20, "computing signals");
            let signals = strategy.batch(TableView::from(&df_tf), &params)?;
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            progress.report(40, "signals computed");
            Ok(EngineOutput {
                mode,
                signal_timeframe: request.timeframe,
                signal_timestamps: df_tf.timestamps.clone(),
                signal_close: df_tf.close.clone(),
                signals,
                params,
                chart: df_tf,
            })
        }
        RunMode::Magnifier => {
            progress.report(18, "preparing magnifier resolution");
            let mag_tf = request.timeframe.magnifier_resolution(DEFAULT_TARGET_TICKS);
            let df_mag = if mag_tf == Timeframe::M1 {
                df_1m.clone()
            } else {
                resample(df_1m, mag_tf)
            };

            let signals = run_magnifier(
                strategy,
                &df_tf,
                &df_mag,
                request.timeframe,
                &params,
                request.backend,
                progress,
                cancel,
            )?;

            Ok(EngineOutput {
                mode,
                signal_timeframe: mag_tf,
                signal_timestamps: df_mag.timestamps,
                signal_close: df_mag.close,
                signals,
                params,
                chart: df_tf,
            })
        }
    }
}
