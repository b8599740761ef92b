//! Backtest engine: parameter resolution, standard and magnifier modes,
//! progress reporting and cancellation.

pub mod backtest;
pub mod magnifier;
pub mod params;
pub mod progress;

use thiserror::Error;

pub use backtest::{run_on_frames, Backtester, EngineOutput, EngineRequest, RunMode};
pub use magnifier::{MagnifierBackend, DEFAULT_TARGET_TICKS};
pub use params::{resolve_params, ParamError};
pub use progress::{CancelToken, NoProgress, ProgressSink};

use crate::data::DataError;
use crate::pine::EvalError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),
    #[error("strategy evaluation failed: {0}")]
    Eval(#[from] EvalError),
    /// Cooperative cancellation; not an error to the user.
    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}
